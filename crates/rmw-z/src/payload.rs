// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Zero-copy or coalesced view over incoming fabric bytes.
//!
//! Fabric payloads arrive as a list of reference-counted slices. When the
//! list holds exactly one slice there is no need to concatenate: the view
//! retains a clone of the slice, and the reference count keeps the backing
//! storage alive for the lifetime of the view. Only the multi-slice case
//! pays for a copy.

use crate::fabric::ZBytes;
use std::sync::Arc;

enum Repr {
    Empty,
    /// Single backing slice, retained through its reference count.
    Contiguous(Arc<[u8]>),
    /// Concatenation of several slices.
    Coalesced(Vec<u8>),
}

/// View over the payload of a received sample.
pub struct Payload {
    repr: Repr,
}

impl Payload {
    /// Build a view over `bytes`, copying only when it is non-contiguous.
    #[must_use]
    pub fn new(bytes: &ZBytes) -> Self {
        let repr = match bytes.slice_count() {
            0 => Repr::Empty,
            1 => match bytes.slice(0) {
                Some(slice) => Repr::Contiguous(Arc::clone(slice)),
                None => Repr::Empty,
            },
            _ => Repr::Coalesced(bytes.to_vec()),
        };
        Self { repr }
    }

    /// The payload bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match &self.repr {
            Repr::Empty => &[],
            Repr::Contiguous(slice) => slice,
            Repr::Coalesced(vec) => vec,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Empty)
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.repr {
            Repr::Empty => "empty",
            Repr::Contiguous(_) => "contiguous",
            Repr::Coalesced(_) => "coalesced",
        };
        f.debug_struct("Payload")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bytes_empty_view() {
        let payload = Payload::new(&ZBytes::empty());
        assert!(payload.is_empty());
        assert_eq!(payload.len(), 0);
        assert!(payload.data().is_empty());
    }

    #[test]
    fn test_single_slice_is_not_copied() {
        let bytes = ZBytes::from_vec(vec![1, 2, 3, 4]);
        let payload = Payload::new(&bytes);
        assert!(!payload.is_empty());
        assert_eq!(payload.data(), &[1, 2, 3, 4]);

        let backing = bytes.slice(0).expect("slice");
        assert!(std::ptr::eq(payload.data().as_ptr(), backing.as_ptr()));
    }

    #[test]
    fn test_view_outlives_original_bytes() {
        let payload = {
            let bytes = ZBytes::from_vec(vec![9; 64]);
            Payload::new(&bytes)
            // `bytes` dropped here; the view's clone keeps the slice alive.
        };
        assert_eq!(payload.len(), 64);
        assert!(payload.data().iter().all(|&b| b == 9));
    }

    #[test]
    fn test_multi_slice_coalesces() {
        let bytes = ZBytes::from_slices(vec![
            Arc::from(vec![1u8, 2].into_boxed_slice()),
            Arc::from(vec![3u8, 4].into_boxed_slice()),
        ]);
        let payload = Payload::new(&bytes);
        assert_eq!(payload.data(), &[1, 2, 3, 4]);
    }
}
