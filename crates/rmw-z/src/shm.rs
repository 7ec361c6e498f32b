// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Optional shared-memory provider gating large-message allocations.
//!
//! SHM support is a capability: when the platform or configuration does not
//! provide it, the no-op provider stands in and every allocation request is
//! declined, which sends publishers down the buffer-pool path. Core logic
//! never branches on a compile-time feature.

use crate::config::ShmConfig;

/// A buffer leased from a shared-memory provider.
#[derive(Debug)]
pub struct ShmBuffer {
    pub data: Vec<u8>,
}

/// Capability surface of a shared-memory provider.
pub trait ShmProvider: Send + Sync {
    /// Lease a buffer of at least `size` bytes, or decline.
    fn allocate(&self, size: usize) -> Option<ShmBuffer>;

    /// Provider label for logs.
    fn name(&self) -> &'static str;
}

/// Provider used when SHM is absent: declines every allocation.
pub struct NoopShmProvider;

impl ShmProvider for NoopShmProvider {
    fn allocate(&self, _size: usize) -> Option<ShmBuffer> {
        None
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Heap-backed provider standing in for a real segment allocator. Serves
/// allocations up to the configured segment size.
pub struct HeapShmProvider {
    segment_size: usize,
}

impl HeapShmProvider {
    #[must_use]
    pub fn new(segment_size: usize) -> Self {
        Self { segment_size }
    }
}

impl ShmProvider for HeapShmProvider {
    fn allocate(&self, size: usize) -> Option<ShmBuffer> {
        if size > self.segment_size {
            return None;
        }
        Some(ShmBuffer {
            data: vec![0; size],
        })
    }

    fn name(&self) -> &'static str {
        "heap"
    }
}

/// Default segment size when the config does not set one (10 MiB).
const SHM_SEGMENT_SIZE: usize = 10 * 1024 * 1024;

/// Shared-memory context owned by the session context.
pub struct ShmContext {
    provider: Box<dyn ShmProvider>,
    msgsize_threshold: usize,
}

impl ShmContext {
    /// Build from the parsed config section, or `None` when SHM is disabled.
    #[must_use]
    pub fn from_config(config: &ShmConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self {
            provider: Box::new(HeapShmProvider::new(SHM_SEGMENT_SIZE)),
            msgsize_threshold: config.msgsize_threshold,
        })
    }

    /// Context around an explicit provider, for tests and embedders.
    #[must_use]
    pub fn with_provider(provider: Box<dyn ShmProvider>, msgsize_threshold: usize) -> Self {
        Self {
            provider,
            msgsize_threshold,
        }
    }

    /// Payloads at or above this size should be served from SHM.
    #[must_use]
    pub fn msgsize_threshold(&self) -> usize {
        self.msgsize_threshold
    }

    /// Lease an SHM buffer, or decline.
    #[must_use]
    pub fn allocate(&self, size: usize) -> Option<ShmBuffer> {
        self.provider.allocate(size)
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_yields_no_context() {
        let config = ShmConfig {
            enabled: false,
            msgsize_threshold: 1024,
        };
        assert!(ShmContext::from_config(&config).is_none());
    }

    #[test]
    fn test_enabled_config_carries_threshold() {
        let config = ShmConfig {
            enabled: true,
            msgsize_threshold: 4096,
        };
        let shm = ShmContext::from_config(&config).expect("enabled");
        assert_eq!(shm.msgsize_threshold(), 4096);
        assert!(shm.allocate(1024).is_some());
    }

    #[test]
    fn test_noop_provider_declines() {
        let shm = ShmContext::with_provider(Box::new(NoopShmProvider), 0);
        assert!(shm.allocate(1).is_none());
        assert_eq!(shm.provider_name(), "noop");
    }

    #[test]
    fn test_heap_provider_respects_segment_size() {
        let provider = HeapShmProvider::new(128);
        assert!(provider.allocate(128).is_some());
        assert!(provider.allocate(129).is_none());
    }
}
