// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wait-set: block until any attached condition triggers.
//!
//! The wait-set itself is a boolean under a mutex plus a condition
//! variable. Entities that can wake it (event slots, message queues, guard
//! conditions) implement [`Waitable`]: `attach` either reports "already
//! ready" or records the wait-set so later triggers can notify it, `detach`
//! clears the record and reports final readiness. A trigger happens-before
//! any wake-up that observes it because both run under the wait-set lock.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Shared wake-up state recorded by attached entities.
pub struct WaitSetState {
    triggered: Mutex<bool>,
    condvar: Condvar,
}

impl WaitSetState {
    fn new() -> Self {
        Self {
            triggered: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Mark the wait-set triggered and wake every blocked waiter.
    pub fn notify(&self) {
        let mut triggered = self
            .triggered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *triggered = true;
        self.condvar.notify_all();
    }
}

/// A condition source that can be multiplexed by a [`WaitSet`].
pub trait Waitable {
    /// If already ready, return `true` without recording the wait-set;
    /// otherwise record it for later notification and return `false`.
    fn attach(&self, wait_set: &Arc<WaitSetState>) -> bool;

    /// Clear the recorded wait-set and return whether the source is ready.
    fn detach(&self) -> bool;
}

/// One-shot latch for wait-set wake-up.
///
/// `trigger` latches the condition; the next wait that observes it consumes
/// it (readiness is reported once, then the latch resets).
pub struct GuardCondition {
    triggered: parking_lot::Mutex<bool>,
    wait_set: parking_lot::Mutex<Option<Arc<WaitSetState>>>,
}

impl GuardCondition {
    #[must_use]
    pub fn new() -> Self {
        Self {
            triggered: parking_lot::Mutex::new(false),
            wait_set: parking_lot::Mutex::new(None),
        }
    }

    /// Latch the condition and wake any attached wait-set.
    pub fn trigger(&self) {
        *self.triggered.lock() = true;
        if let Some(wait_set) = self.wait_set.lock().as_ref() {
            wait_set.notify();
        }
    }

    /// Whether the latch is currently set (not consuming it).
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock()
    }
}

impl Default for GuardCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl Waitable for GuardCondition {
    fn attach(&self, wait_set: &Arc<WaitSetState>) -> bool {
        let triggered = self.triggered.lock();
        if *triggered {
            return true;
        }
        *self.wait_set.lock() = Some(Arc::clone(wait_set));
        false
    }

    fn detach(&self) -> bool {
        let mut triggered = self.triggered.lock();
        *self.wait_set.lock() = None;
        std::mem::take(&mut *triggered)
    }
}

/// Multiplexes many condition sources until any triggers or the deadline
/// passes.
pub struct WaitSet {
    state: Arc<WaitSetState>,
}

impl WaitSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(WaitSetState::new()),
        }
    }

    /// Wait until at least one item is ready or `timeout` expires.
    ///
    /// `Some(Duration::ZERO)` polls, `None` waits indefinitely. Returns one
    /// readiness flag per item, in order.
    pub fn wait(&self, items: &[&dyn Waitable], timeout: Option<Duration>) -> Vec<bool> {
        {
            let mut triggered = self
                .state
                .triggered
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *triggered = false;
        }

        let mut ready = vec![false; items.len()];
        let mut any_ready = false;
        for (index, item) in items.iter().enumerate() {
            if item.attach(&self.state) {
                ready[index] = true;
                any_ready = true;
            }
        }

        if !any_ready && !items.is_empty() {
            self.block(timeout);
        }

        for (index, item) in items.iter().enumerate() {
            // Detach unconditionally: it consumes one-shot latches and
            // reports data that arrived while blocking.
            if item.detach() {
                ready[index] = true;
            }
        }
        ready
    }

    fn block(&self, timeout: Option<Duration>) {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut triggered = self
            .state
            .triggered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        while !*triggered {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return;
                    }
                    let (guard, _) = self
                        .state
                        .condvar
                        .wait_timeout(triggered, deadline - now)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    triggered = guard;
                }
                None => {
                    triggered = self
                        .state
                        .condvar
                        .wait(triggered)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                }
            }
        }
    }
}

impl Default for WaitSet {
    fn default() -> Self {
        Self::new()
    }
}
