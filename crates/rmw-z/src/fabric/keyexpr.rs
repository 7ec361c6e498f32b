// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Key expressions: `/`-separated routable names with wildcard matching.
//!
//! A chunk is either a literal, `*` (exactly one chunk) or `**` (any number
//! of chunks, including none). Two key expressions intersect when some
//! concrete key matches both; for the subset used here (one side is always
//! fully concrete) intersection and inclusion coincide.

use std::fmt;

/// Validated key expression.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyExpr {
    inner: String,
}

impl KeyExpr {
    /// Validate and build a key expression.
    ///
    /// Rejects empty expressions, leading/trailing `/`, empty chunks and
    /// chunks that mix a wildcard with other characters.
    pub fn new(expr: impl Into<String>) -> Option<Self> {
        let inner = expr.into();
        if inner.is_empty() || inner.starts_with('/') || inner.ends_with('/') {
            return None;
        }
        for chunk in inner.split('/') {
            if chunk.is_empty() {
                return None;
            }
            if chunk.contains('*') && chunk != "*" && chunk != "**" {
                return None;
            }
        }
        Some(Self { inner })
    }

    /// The expression as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Whether the expression contains no wildcards.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.inner.split('/').all(|c| c != "*" && c != "**")
    }

    /// Whether this expression and `other` share at least one concrete key.
    #[must_use]
    pub fn intersects(&self, other: &KeyExpr) -> bool {
        let lhs: Vec<&str> = self.inner.split('/').collect();
        let rhs: Vec<&str> = other.inner.split('/').collect();
        chunks_intersect(&lhs, &rhs)
    }
}

fn chunk_matches(a: &str, b: &str) -> bool {
    a == b || a == "*" || b == "*"
}

fn chunks_intersect(lhs: &[&str], rhs: &[&str]) -> bool {
    match (lhs.first(), rhs.first()) {
        (None, None) => true,
        (Some(&"**"), _) => {
            // `**` absorbs zero chunks or one chunk of the other side.
            chunks_intersect(&lhs[1..], rhs)
                || (!rhs.is_empty() && chunks_intersect(lhs, &rhs[1..]))
        }
        (_, Some(&"**")) => {
            chunks_intersect(lhs, &rhs[1..])
                || (!lhs.is_empty() && chunks_intersect(&lhs[1..], rhs))
        }
        (Some(a), Some(b)) => chunk_matches(a, b) && chunks_intersect(&lhs[1..], &rhs[1..]),
        _ => false,
    }
}

impl fmt::Display for KeyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl fmt::Debug for KeyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyExpr({})", self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ke(s: &str) -> KeyExpr {
        KeyExpr::new(s).expect("valid key expression")
    }

    #[test]
    fn test_rejects_malformed_expressions() {
        assert!(KeyExpr::new("").is_none());
        assert!(KeyExpr::new("/abs").is_none());
        assert!(KeyExpr::new("trail/").is_none());
        assert!(KeyExpr::new("a//b").is_none());
        assert!(KeyExpr::new("a/b*c").is_none());
    }

    #[test]
    fn test_concrete_equality_intersects() {
        assert!(ke("a/b/c").intersects(&ke("a/b/c")));
        assert!(!ke("a/b/c").intersects(&ke("a/b/d")));
        assert!(!ke("a/b").intersects(&ke("a/b/c")));
    }

    #[test]
    fn test_single_wildcard_matches_one_chunk() {
        assert!(ke("a/*/c").intersects(&ke("a/b/c")));
        assert!(!ke("a/*/c").intersects(&ke("a/b/x/c")));
    }

    #[test]
    fn test_double_wildcard_matches_any_depth() {
        assert!(ke("a/**").intersects(&ke("a")));
        assert!(ke("a/**").intersects(&ke("a/b/c/d")));
        assert!(ke("**/d").intersects(&ke("a/b/c/d")));
        assert!(!ke("a/**").intersects(&ke("b/c")));
    }

    #[test]
    fn test_mixed_wildcards() {
        assert!(ke("@x/0/*/*/*/*/7/**").intersects(&ke("@x/0/z1/n1/e1/MP/7/ns/node/enc")));
        assert!(!ke("@x/0/*/*/*/*/7/**").intersects(&ke("@x/0/z1/n1/e1/MP/8/ns/node/enc")));
    }

    #[test]
    fn test_is_concrete() {
        assert!(ke("a/b/c").is_concrete());
        assert!(!ke("a/*/c").is_concrete());
        assert!(!ke("a/**").is_concrete());
    }
}
