// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session configuration and environment lookups.
//!
//! Config *loading* happens outside the core: callers hand over an already
//! parsed [`SessionConfig`]. This module only defines that object plus the
//! readers for the environment variables the adapter documents.

use serde::{Deserialize, Serialize};

/// Default buffer pool cap (16 MiB).
///
/// Pooled buffers are recycled with the expectation that they reside in
/// cache, so the cap should be comparable to the size of a modern CPU cache.
pub const DEFAULT_BUFFER_POOL_MAX_SIZE: usize = 16 * 1024 * 1024;

/// Default SHM message-size threshold in bytes. Payloads smaller than this
/// are cheaper to copy than to route through a shared-memory segment.
pub const DEFAULT_SHM_MSGSIZE_THRESHOLD: usize = 2 * 1024;

/// Parsed shared-memory section of the session config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShmConfig {
    /// Whether the session should initialize a shared-memory provider.
    #[serde(default)]
    pub enabled: bool,
    /// Payloads at or above this size are served from SHM.
    #[serde(default = "default_msgsize_threshold")]
    pub msgsize_threshold: usize,
}

fn default_msgsize_threshold() -> usize {
    DEFAULT_SHM_MSGSIZE_THRESHOLD
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            msgsize_threshold: DEFAULT_SHM_MSGSIZE_THRESHOLD,
        }
    }
}

/// Parsed session configuration handed to [`crate::Context::new`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Endpoints this session connects to. Informational for the in-process
    /// fabric; kept so configs survive a round-trip through serde.
    #[serde(default)]
    pub connect: Vec<String>,
    /// Whether this session acts as a router for its peers.
    #[serde(default)]
    pub router_mode: bool,
    /// Shared-memory section.
    #[serde(default)]
    pub shared_memory: ShmConfig,
    /// URI the config was loaded from, when it came from a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl SessionConfig {
    /// Config for a plain peer session.
    #[must_use]
    pub fn peer() -> Self {
        Self::default()
    }

    /// Config for a router-mode session.
    #[must_use]
    pub fn router() -> Self {
        Self {
            router_mode: true,
            ..Self::default()
        }
    }
}

/// Maximum total bytes the buffer pool may hold, from
/// `RMW_ZENOH_BUFFER_POOL_MAX_SIZE_BYTES`.
///
/// An unset or empty variable yields the default; an unparsable value is
/// reported and the default is used.
#[must_use]
pub fn buffer_pool_max_size() -> usize {
    match std::env::var("RMW_ZENOH_BUFFER_POOL_MAX_SIZE_BYTES") {
        Ok(value) if value.is_empty() => DEFAULT_BUFFER_POOL_MAX_SIZE,
        Ok(value) => match value.parse::<usize>() {
            Ok(size) => size,
            Err(_) => {
                log::warn!(
                    "[config] Unable to parse maximum buffer pool size {:?}, falling back to default",
                    value
                );
                DEFAULT_BUFFER_POOL_MAX_SIZE
            }
        },
        Err(_) => DEFAULT_BUFFER_POOL_MAX_SIZE,
    }
}

/// Number of router connection attempts, from `ZENOH_ROUTER_CHECK_ATTEMPTS`.
///
/// `None` disables the check (the default, and the meaning of `0`).
#[must_use]
pub fn router_check_attempts() -> Option<u64> {
    match std::env::var("ZENOH_ROUTER_CHECK_ATTEMPTS") {
        Ok(value) => match value.parse::<u64>() {
            Ok(0) | Err(_) => None,
            Ok(attempts) => Some(attempts),
        },
        Err(_) => None,
    }
}

/// Path of the session config file, from `ZENOH_SESSION_CONFIG_URI`.
///
/// The core never loads the file itself; the out-of-scope loader does and
/// records the URI in [`SessionConfig::source_uri`].
#[must_use]
pub fn session_config_uri() -> Option<String> {
    std::env::var("ZENOH_SESSION_CONFIG_URI")
        .ok()
        .filter(|uri| !uri.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_round_trips_through_serde() {
        let config = SessionConfig {
            connect: vec!["tcp/192.168.1.1:7447".to_string()],
            router_mode: false,
            shared_memory: ShmConfig {
                enabled: true,
                msgsize_threshold: 4096,
            },
            source_uri: Some("/etc/session.json5".to_string()),
        };

        let json = serde_json::to_string(&config).expect("serialize");
        let back: SessionConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.connect, config.connect);
        assert!(back.shared_memory.enabled);
        assert_eq!(back.shared_memory.msgsize_threshold, 4096);
        assert_eq!(back.source_uri.as_deref(), Some("/etc/session.json5"));
    }

    #[test]
    fn test_shm_defaults_disabled() {
        let config: SessionConfig = serde_json::from_str("{}").expect("deserialize");
        assert!(!config.shared_memory.enabled);
        assert_eq!(
            config.shared_memory.msgsize_threshold,
            DEFAULT_SHM_MSGSIZE_THRESHOLD
        );
    }
}
