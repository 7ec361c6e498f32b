// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded FIFO for received samples, queries and replies.
//!
//! Pushed from fabric callback threads, popped from user threads. On
//! overflow the oldest element is dropped and returned to the caller so the
//! owning entity can raise its loss event. A wait-set record makes the
//! queue attachable: pushes notify blocked waiters.

use crate::wait::{WaitSetState, Waitable};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded FIFO with drop-oldest overflow and wait-set integration.
pub struct MessageQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    wait_set: Mutex<Option<Arc<WaitSetState>>>,
}

impl<T> MessageQueue<T> {
    /// Queue bounded to `capacity` elements (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            wait_set: Mutex::new(None),
        }
    }

    /// Unbounded queue (for keep-all history).
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: usize::MAX,
            wait_set: Mutex::new(None),
        }
    }

    /// Append an element, returning the dropped oldest element when full.
    /// Wakes any attached wait-set.
    pub fn push(&self, item: T) -> Option<T> {
        let dropped = {
            let mut items = self.items.lock();
            let dropped = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            dropped
        };

        if let Some(wait_set) = self.wait_set.lock().as_ref() {
            wait_set.notify();
        }
        dropped
    }

    /// Remove and return the oldest element.
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Waitable for MessageQueue<T> {
    fn attach(&self, wait_set: &Arc<WaitSetState>) -> bool {
        let items = self.items.lock();
        if !items.is_empty() {
            return true;
        }
        *self.wait_set.lock() = Some(Arc::clone(wait_set));
        false
    }

    fn detach(&self) -> bool {
        let items = self.items.lock();
        *self.wait_set.lock() = None;
        !items.is_empty()
    }
}
