// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS profiles and requested-vs-offered compatibility checking.
//!
//! Durations are nanoseconds with `0` meaning "unspecified", which behaves
//! as an infinite period: an unspecified request is satisfied by anything,
//! an unspecified offer satisfies only an unspecified request.

/// Reliability policy. Wire values follow the ROS rmw enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reliability {
    #[default]
    Reliable = 1,
    BestEffort = 2,
}

/// Durability policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    TransientLocal = 1,
    #[default]
    Volatile = 2,
}

/// History policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum History {
    #[default]
    KeepLast = 1,
    KeepAll = 2,
}

/// Liveliness policy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivelinessKind {
    #[default]
    Automatic = 1,
    ManualByTopic = 3,
}

/// QoS profile attached to every topic-level entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosProfile {
    pub reliability: Reliability,
    pub durability: Durability,
    pub history: History,
    /// History depth for `KeepLast`.
    pub depth: u32,
    /// Deadline period in nanoseconds, `0` = unspecified.
    pub deadline_ns: u64,
    /// Lifespan in nanoseconds, `0` = unspecified.
    pub lifespan_ns: u64,
    pub liveliness: LivelinessKind,
    /// Liveliness lease duration in nanoseconds, `0` = unspecified.
    pub liveliness_lease_ns: u64,
}

impl Default for QosProfile {
    fn default() -> Self {
        Self {
            reliability: Reliability::Reliable,
            durability: Durability::Volatile,
            history: History::KeepLast,
            depth: 10,
            deadline_ns: 0,
            lifespan_ns: 0,
            liveliness: LivelinessKind::Automatic,
            liveliness_lease_ns: 0,
        }
    }
}

impl QosProfile {
    /// Default profile with best-effort reliability.
    #[must_use]
    pub fn best_effort() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            ..Self::default()
        }
    }

    /// Default profile with transient-local durability.
    #[must_use]
    pub fn transient_local() -> Self {
        Self {
            durability: Durability::TransientLocal,
            ..Self::default()
        }
    }

    /// Default profile with the given history depth.
    #[must_use]
    pub fn keep_last(depth: u32) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

/// Policy that failed a compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Reliability,
    Durability,
    Deadline,
    Lifespan,
    Liveliness,
    LivelinessLease,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PolicyKind::Reliability => "RELIABILITY",
            PolicyKind::Durability => "DURABILITY",
            PolicyKind::Deadline => "DEADLINE",
            PolicyKind::Lifespan => "LIFESPAN",
            PolicyKind::Liveliness => "LIVELINESS",
            PolicyKind::LivelinessLease => "LIVELINESS_LEASE_DURATION",
        };
        f.write_str(name)
    }
}

/// `0` encodes an unspecified (infinite) period.
fn period(ns: u64) -> u64 {
    if ns == 0 {
        u64::MAX
    } else {
        ns
    }
}

/// Check whether an offered (publisher-side) profile satisfies a requested
/// (subscription-side) profile.
///
/// Rules:
/// - best-effort request is satisfied by any offer; a reliable request
///   requires a reliable offer;
/// - volatile request is satisfied by any offer; transient-local requires
///   transient-local;
/// - deadline, lifespan, liveliness lease: requested period must be >= the
///   offered period;
/// - liveliness kind: the offered kind must be at least as strong.
///
/// Returns `Err(policy)` naming the first policy that failed.
pub fn check_compatibility(
    offered: &QosProfile,
    requested: &QosProfile,
) -> Result<(), PolicyKind> {
    if matches!(
        (offered.reliability, requested.reliability),
        (Reliability::BestEffort, Reliability::Reliable)
    ) {
        log::debug!("[qos] reliability mismatch (offered=best-effort, requested=reliable)");
        return Err(PolicyKind::Reliability);
    }

    if matches!(
        (offered.durability, requested.durability),
        (Durability::Volatile, Durability::TransientLocal)
    ) {
        log::debug!("[qos] durability mismatch (offered=volatile, requested=transient-local)");
        return Err(PolicyKind::Durability);
    }

    if period(requested.deadline_ns) < period(offered.deadline_ns) {
        log::debug!(
            "[qos] deadline mismatch (offered={}ns, requested={}ns)",
            offered.deadline_ns,
            requested.deadline_ns
        );
        return Err(PolicyKind::Deadline);
    }

    if period(requested.lifespan_ns) < period(offered.lifespan_ns) {
        log::debug!(
            "[qos] lifespan mismatch (offered={}ns, requested={}ns)",
            offered.lifespan_ns,
            requested.lifespan_ns
        );
        return Err(PolicyKind::Lifespan);
    }

    let strength = |kind: LivelinessKind| match kind {
        LivelinessKind::Automatic => 0u8,
        LivelinessKind::ManualByTopic => 1u8,
    };
    if strength(offered.liveliness) < strength(requested.liveliness) {
        log::debug!(
            "[qos] liveliness kind mismatch (offered={:?}, requested={:?})",
            offered.liveliness,
            requested.liveliness
        );
        return Err(PolicyKind::Liveliness);
    }

    if period(requested.liveliness_lease_ns) < period(offered.liveliness_lease_ns) {
        log::debug!(
            "[qos] liveliness lease mismatch (offered={}ns, requested={}ns)",
            offered.liveliness_lease_ns,
            requested.liveliness_lease_ns
        );
        return Err(PolicyKind::LivelinessLease);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_compatible() {
        assert!(check_compatibility(&QosProfile::default(), &QosProfile::default()).is_ok());
    }

    #[test]
    fn test_best_effort_request_accepts_any_offer() {
        let requested = QosProfile::best_effort();
        assert!(check_compatibility(&QosProfile::default(), &requested).is_ok());
        assert!(check_compatibility(&QosProfile::best_effort(), &requested).is_ok());
    }

    #[test]
    fn test_reliable_request_rejects_best_effort_offer() {
        let offered = QosProfile::best_effort();
        let requested = QosProfile::default();
        assert_eq!(
            check_compatibility(&offered, &requested),
            Err(PolicyKind::Reliability)
        );
    }

    #[test]
    fn test_transient_local_request_rejects_volatile_offer() {
        let offered = QosProfile::default();
        let requested = QosProfile::transient_local();
        assert_eq!(
            check_compatibility(&offered, &requested),
            Err(PolicyKind::Durability)
        );
    }

    #[test]
    fn test_transient_local_offer_accepts_volatile_request() {
        let offered = QosProfile::transient_local();
        let requested = QosProfile::default();
        assert!(check_compatibility(&offered, &requested).is_ok());
    }

    #[test]
    fn test_deadline_requested_must_cover_offered() {
        let offered = QosProfile {
            deadline_ns: 100,
            ..QosProfile::default()
        };
        let ok = QosProfile {
            deadline_ns: 200,
            ..QosProfile::default()
        };
        let too_tight = QosProfile {
            deadline_ns: 50,
            ..QosProfile::default()
        };
        assert!(check_compatibility(&offered, &ok).is_ok());
        assert_eq!(
            check_compatibility(&offered, &too_tight),
            Err(PolicyKind::Deadline)
        );
    }

    #[test]
    fn test_unspecified_deadline_behaves_as_infinite() {
        let offered_unset = QosProfile::default();
        let requested_set = QosProfile {
            deadline_ns: 100,
            ..QosProfile::default()
        };
        // Unspecified offer cannot satisfy a finite request.
        assert_eq!(
            check_compatibility(&offered_unset, &requested_set),
            Err(PolicyKind::Deadline)
        );
        // Unspecified request is satisfied by anything.
        let offered_set = QosProfile {
            deadline_ns: 100,
            ..QosProfile::default()
        };
        assert!(check_compatibility(&offered_set, &QosProfile::default()).is_ok());
    }

    #[test]
    fn test_liveliness_lease_rule() {
        let offered = QosProfile {
            liveliness_lease_ns: 1_000,
            ..QosProfile::default()
        };
        let requested = QosProfile {
            liveliness_lease_ns: 500,
            ..QosProfile::default()
        };
        assert_eq!(
            check_compatibility(&offered, &requested),
            Err(PolicyKind::LivelinessLease)
        );
        assert!(check_compatibility(&requested, &offered).is_ok());
    }

    #[test]
    fn test_manual_liveliness_request_needs_manual_offer() {
        let offered = QosProfile::default();
        let requested = QosProfile {
            liveliness: LivelinessKind::ManualByTopic,
            ..QosProfile::default()
        };
        assert_eq!(
            check_compatibility(&offered, &requested),
            Err(PolicyKind::Liveliness)
        );
        assert!(check_compatibility(&requested, &offered).is_ok());
    }
}
