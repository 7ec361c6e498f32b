// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for the scenario tests. Contexts live in one process, so
//! every test file uses its own domain ids to stay isolated.

use rmw_z::type_support::{Message, TypedSupport};
use rmw_z::{Context, Error, Result, SessionConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Test message: a single little-endian i64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count {
    pub value: i64,
}

impl Message for Count {
    fn type_name() -> &'static str {
        "test_msgs/msg/Count"
    }

    fn type_hash() -> &'static str {
        "RIHS01_count"
    }

    fn encoded_len(&self) -> usize {
        8
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 8 {
            return Err(Error::SerializationError);
        }
        buf[..8].copy_from_slice(&self.value.to_le_bytes());
        Ok(8)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(Error::SerializationError);
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[..8]);
        Ok(Self {
            value: i64::from_le_bytes(raw),
        })
    }
}

pub fn count_support() -> Arc<TypedSupport<Count>> {
    TypedSupport::<Count>::new()
}

pub fn context(domain_id: u32) -> Context {
    let _ = env_logger::builder().is_test(true).try_init();
    Context::new(domain_id, "", SessionConfig::peer()).expect("context")
}

/// Poll `predicate` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

pub fn assert_eventually(timeout: Duration, what: &str, predicate: impl Fn() -> bool) {
    assert!(wait_until(timeout, predicate), "timed out waiting for {}", what);
}
