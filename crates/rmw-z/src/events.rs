// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-entity event bookkeeping: counters, user callbacks, wait-set hooks.
//!
//! Each entity owns an [`EventsManager`] with one slot per [`EventKind`].
//! A slot coalesces triggers that happen before a callback is installed
//! into an unread count (drained when the callback arrives), accumulates
//! status counters for `take_status`, and carries the wait-set record used
//! to wake blocked waiters.
//!
//! Locking: two mutexes per manager - slot state first, wait-set records
//! second, always in that order. Callbacks run under the slot lock and must
//! not call back into the same manager.

use crate::wait::{WaitSetState, Waitable};
use parking_lot::Mutex;
use std::sync::Arc;

/// Events the middleware reports on entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestedQosIncompatible,
    OfferedQosIncompatible,
    MessageLost,
    SubscriptionMatched,
    PublicationMatched,
    SubscriptionIncompatibleType,
    PublisherIncompatibleType,
}

impl EventKind {
    /// All kinds, in slot order.
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::RequestedQosIncompatible,
        EventKind::OfferedQosIncompatible,
        EventKind::MessageLost,
        EventKind::SubscriptionMatched,
        EventKind::PublicationMatched,
        EventKind::SubscriptionIncompatibleType,
        EventKind::PublisherIncompatibleType,
    ];

    fn index(self) -> usize {
        match self {
            EventKind::RequestedQosIncompatible => 0,
            EventKind::OfferedQosIncompatible => 1,
            EventKind::MessageLost => 2,
            EventKind::SubscriptionMatched => 3,
            EventKind::PublicationMatched => 4,
            EventKind::SubscriptionIncompatibleType => 5,
            EventKind::PublisherIncompatibleType => 6,
        }
    }
}

/// Number of event slots per manager.
pub const EVENT_KIND_COUNT: usize = 7;

/// Status counters for one (entity, event kind) pair.
///
/// `total_count` never decreases; the `*_change` fields are deltas since
/// the last `take_status` and reset to zero there; `changed` is true iff
/// any delta is non-zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStatus {
    pub total_count: u64,
    pub total_count_change: u64,
    pub current_count: i64,
    pub current_count_change: i64,
    /// Free-form detail for the last change (e.g. the offending type name).
    pub data: String,
    pub changed: bool,
}

/// Callback invoked with the number of coalesced occurrences.
pub type EventCallback = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct EventSlot {
    status: EventStatus,
    callback: Option<EventCallback>,
    unread_count: usize,
}

/// Per-entity event state. See the module docs for the locking rules.
pub struct EventsManager {
    slots: Mutex<[EventSlot; EVENT_KIND_COUNT]>,
    wait_sets: Mutex<[Option<Arc<WaitSetState>>; EVENT_KIND_COUNT]>,
}

impl EventsManager {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(Default::default()),
            wait_sets: Mutex::new(Default::default()),
        })
    }

    /// Install (or with `None` remove) the callback for `kind`.
    ///
    /// Occurrences that arrived before installation are delivered
    /// immediately as one invocation carrying the coalesced count.
    pub fn set_callback(&self, kind: EventKind, callback: Option<EventCallback>) {
        let mut slots = self.slots.lock();
        let slot = &mut slots[kind.index()];
        match callback {
            Some(callback) => {
                if slot.unread_count > 0 {
                    callback(slot.unread_count);
                    slot.unread_count = 0;
                }
                slot.callback = Some(callback);
            }
            None => {
                slot.callback = None;
            }
        }
    }

    /// Invoke the callback for `kind` once, or count the occurrence for a
    /// later install.
    pub fn trigger(&self, kind: EventKind) {
        let mut slots = self.slots.lock();
        let slot = &mut slots[kind.index()];
        match &slot.callback {
            Some(callback) => callback(1),
            None => slot.unread_count += 1,
        }
    }

    /// Apply a status change, then fire the callback and wake any attached
    /// wait-set.
    pub fn update_status(&self, kind: EventKind, current_count_change: i64) {
        self.update(kind, current_count_change, None);
    }

    /// [`Self::update_status`] carrying a detail string.
    pub fn update_status_with_data(&self, kind: EventKind, current_count_change: i64, data: &str) {
        self.update(kind, current_count_change, Some(data));
    }

    fn update(&self, kind: EventKind, current_count_change: i64, data: Option<&str>) {
        {
            let mut slots = self.slots.lock();
            let slot = &mut slots[kind.index()];
            let positive = u64::try_from(current_count_change.max(0)).unwrap_or(0);
            slot.status.total_count += positive;
            slot.status.total_count_change += positive;
            slot.status.current_count += current_count_change;
            slot.status.current_count_change += current_count_change;
            if let Some(data) = data {
                slot.status.data = data.to_string();
            }
            slot.status.changed = true;

            match &slot.callback {
                Some(callback) => callback(1),
                None => slot.unread_count += 1,
            }
        }

        self.notify(kind);
    }

    /// Snapshot the status and reset the change-tracking fields.
    #[must_use]
    pub fn take_status(&self, kind: EventKind) -> EventStatus {
        let mut slots = self.slots.lock();
        let slot = &mut slots[kind.index()];
        let snapshot = slot.status.clone();
        slot.status.total_count_change = 0;
        slot.status.current_count_change = 0;
        slot.status.changed = false;
        snapshot
    }

    /// Current status without resetting anything.
    #[must_use]
    pub fn status(&self, kind: EventKind) -> EventStatus {
        self.slots.lock()[kind.index()].status.clone()
    }

    /// Adapter implementing [`Waitable`] for one event slot.
    #[must_use]
    pub fn waitable(self: &Arc<Self>, kind: EventKind) -> EventWaitable {
        EventWaitable {
            manager: Arc::clone(self),
            kind,
        }
    }

    fn attach(&self, kind: EventKind, wait_set: &Arc<WaitSetState>) -> bool {
        let slots = self.slots.lock();
        if slots[kind.index()].status.changed {
            return true;
        }
        self.wait_sets.lock()[kind.index()] = Some(Arc::clone(wait_set));
        false
    }

    fn detach(&self, kind: EventKind) -> bool {
        let slots = self.slots.lock();
        self.wait_sets.lock()[kind.index()] = None;
        slots[kind.index()].status.changed
    }

    fn notify(&self, kind: EventKind) {
        let wait_sets = self.wait_sets.lock();
        if let Some(wait_set) = wait_sets[kind.index()].as_ref() {
            wait_set.notify();
        }
    }
}

/// One (manager, kind) pair attachable to a wait-set.
pub struct EventWaitable {
    manager: Arc<EventsManager>,
    kind: EventKind,
}

impl Waitable for EventWaitable {
    fn attach(&self, wait_set: &Arc<WaitSetState>) -> bool {
        self.manager.attach(self.kind, wait_set)
    }

    fn detach(&self) -> bool {
        self.manager.detach(self.kind)
    }
}

/// Coalescing callback slot for "new data" notifications (subscriptions,
/// services, clients), with the same drain-on-install semantics as event
/// slots.
pub struct DataCallbackManager {
    inner: Mutex<DataCallbackState>,
}

#[derive(Default)]
struct DataCallbackState {
    callback: Option<EventCallback>,
    unread_count: usize,
}

impl DataCallbackManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DataCallbackState::default()),
        }
    }

    /// Install or remove the new-data callback, draining coalesced counts.
    pub fn set_callback(&self, callback: Option<EventCallback>) {
        let mut state = self.inner.lock();
        match callback {
            Some(callback) => {
                if state.unread_count > 0 {
                    callback(state.unread_count);
                    state.unread_count = 0;
                }
                state.callback = Some(callback);
            }
            None => state.callback = None,
        }
    }

    /// Report one new-data occurrence.
    pub fn trigger(&self) {
        let mut state = self.inner.lock();
        match &state.callback {
            Some(callback) => callback(1),
            None => state.unread_count += 1,
        }
    }
}

impl Default for DataCallbackManager {
    fn default() -> Self {
        Self::new()
    }
}
