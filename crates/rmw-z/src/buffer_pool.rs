// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded pool of reusable serialization buffers.
//!
//! Buffers are recycled LIFO so the most recently released (and most likely
//! cache-resident) buffer is handed out first. The cap bounds the sum of
//! pooled and outstanding capacity; release never frees, the pool drains
//! when it is dropped.

use crate::config::buffer_pool_max_size;
use parking_lot::Mutex;

/// A buffer leased from the pool. Contents are unspecified; capacity is at
/// least the requested size.
#[derive(Debug)]
pub struct Buffer {
    pub data: Vec<u8>,
}

impl Buffer {
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }
}

struct PoolInner {
    buffers: Vec<Buffer>,
    /// Total capacity accounted against the cap (pooled and outstanding
    /// alike; release returns capacity to the pool, not to the cap).
    size: usize,
}

/// Thread-safe LIFO buffer pool with a byte cap. One mutex serializes
/// allocate and release.
pub struct BufferPool {
    inner: Mutex<PoolInner>,
    max_size: usize,
}

impl BufferPool {
    /// Pool with the cap from `RMW_ZENOH_BUFFER_POOL_MAX_SIZE_BYTES`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_size(buffer_pool_max_size())
    }

    /// Pool with an explicit cap in bytes.
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                buffers: Vec::new(),
                size: 0,
            }),
            max_size,
        }
    }

    /// Lease a buffer of at least `size` bytes.
    ///
    /// Returns `None` when serving the request would push the accounted
    /// capacity past the cap.
    #[must_use]
    pub fn allocate(&self, size: usize) -> Option<Buffer> {
        let mut inner = self.inner.lock();

        match inner.buffers.pop() {
            None => {
                if inner.size.checked_add(size)? > self.max_size {
                    return None;
                }
                let mut data = Vec::new();
                data.try_reserve_exact(size).ok()?;
                data.resize(size, 0);
                inner.size += size;
                Some(Buffer { data })
            }
            Some(mut buffer) => {
                if buffer.data.capacity() < size {
                    let grow = size - buffer.data.capacity();
                    if inner.size.checked_add(grow)? > self.max_size {
                        inner.buffers.push(buffer);
                        return None;
                    }
                    let reserve = size - buffer.data.len();
                    if buffer.data.try_reserve_exact(reserve).is_err() {
                        inner.buffers.push(buffer);
                        return None;
                    }
                    inner.size += grow;
                }
                buffer.data.resize(size, 0);
                Some(buffer)
            }
        }
    }

    /// Return a buffer to the pool. Never frees.
    pub fn release(&self, buffer: Buffer) {
        self.inner.lock().buffers.push(buffer);
    }

    /// Capacity currently accounted against the cap.
    #[must_use]
    pub fn accounted_bytes(&self) -> usize {
        self.inner.lock().size
    }

    /// Configured cap in bytes.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release_recycles_lifo() {
        let pool = BufferPool::with_max_size(1024);
        let a = pool.allocate(100).expect("allocate a");
        let b = pool.allocate(200).expect("allocate b");
        let a_cap = a.capacity();
        let b_cap = b.capacity();

        pool.release(a);
        pool.release(b);

        // Most recently released comes back first.
        let again = pool.allocate(50).expect("allocate again");
        assert_eq!(again.capacity(), b_cap);
        let next = pool.allocate(50).expect("allocate next");
        assert_eq!(next.capacity(), a_cap);
    }

    #[test]
    fn test_cap_is_enforced() {
        let pool = BufferPool::with_max_size(256);
        let first = pool.allocate(200).expect("first fits");
        assert!(pool.allocate(100).is_none(), "second would exceed the cap");
        pool.release(first);
        // Recycled buffer serves the request without new accounting.
        assert!(pool.allocate(100).is_some());
    }

    #[test]
    fn test_grow_in_place_accounts_delta() {
        let pool = BufferPool::with_max_size(300);
        let buffer = pool.allocate(100).expect("allocate");
        pool.release(buffer);

        let grown = pool.allocate(250).expect("grow within cap");
        assert!(grown.capacity() >= 250);
        assert!(pool.accounted_bytes() >= 250);
        pool.release(grown);

        // Growing past the cap fails and keeps the buffer pooled.
        assert!(pool.allocate(400).is_none());
        assert!(pool.allocate(250).is_some(), "pooled buffer still usable");
    }

    #[test]
    fn test_zero_cap_rejects_every_allocation() {
        let pool = BufferPool::with_max_size(0);
        assert!(pool.allocate(1).is_none());
        assert!(pool.allocate(0).is_some(), "zero-size lease needs no bytes");
    }

    #[test]
    fn test_accounting_invariant_under_churn() {
        let pool = BufferPool::with_max_size(4096);
        for round in 0..32 {
            let size = 64 + (round % 7) * 100;
            if let Some(buffer) = pool.allocate(size) {
                assert!(buffer.data.len() >= size);
                pool.release(buffer);
            }
            assert!(pool.accounted_bytes() <= pool.max_size());
        }
    }

    #[test]
    fn test_concurrent_allocate_release() {
        use std::sync::Arc;
        let pool = Arc::new(BufferPool::with_max_size(1 << 20));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    if let Some(buffer) = pool.allocate(128 + i) {
                        pool.release(buffer);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker");
        }
        assert!(pool.accounted_bytes() <= pool.max_size());
    }
}
