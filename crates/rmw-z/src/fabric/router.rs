// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-global in-memory router backing [`super::Session`].
//!
//! Registration (subscribers, queryables, liveliness tokens) is synchronous
//! under the router lock; delivery of puts, liveliness changes and queries
//! goes through a single dispatch thread fed by an unbounded channel. One
//! queue plus one thread gives per-publisher FIFO delivery and keeps
//! callbacks off user threads.

use super::{now_ns, KeyExpr, QueryCallback, ReplyCallback, Sample, SampleCallback, SampleKind, ZBytes};
use crossbeam::channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// A query delivered to a queryable callback. Replies go straight back to
/// the issuing session's reply callback.
pub struct Query {
    keyexpr: KeyExpr,
    payload: ZBytes,
    attachment: Option<Vec<u8>>,
    reply_to: Arc<ReplyCallback>,
}

impl Query {
    #[must_use]
    pub fn keyexpr(&self) -> &KeyExpr {
        &self.keyexpr
    }

    #[must_use]
    pub fn payload(&self) -> &ZBytes {
        &self.payload
    }

    #[must_use]
    pub fn attachment(&self) -> Option<&[u8]> {
        self.attachment.as_deref()
    }

    /// Send a reply to the querier.
    pub fn reply(&self, payload: ZBytes, attachment: Option<Vec<u8>>) {
        (self.reply_to.as_ref())(Reply {
            keyexpr: self.keyexpr.clone(),
            payload,
            attachment,
            received_ns: now_ns(),
        });
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("keyexpr", &self.keyexpr)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// A reply delivered to the reply callback of a `get`.
#[derive(Debug, Clone)]
pub struct Reply {
    pub keyexpr: KeyExpr,
    pub payload: ZBytes,
    pub attachment: Option<Vec<u8>>,
    pub received_ns: i64,
}

struct SubscriberEntry {
    id: u64,
    keyexpr: KeyExpr,
    callback: Arc<SampleCallback>,
}

struct QueryableEntry {
    id: u64,
    keyexpr: KeyExpr,
    callback: Arc<QueryCallback>,
}

struct CacheEntry {
    id: u64,
    keyexpr: KeyExpr,
    history: usize,
    ring: std::collections::VecDeque<(ZBytes, Option<Vec<u8>>)>,
}

#[derive(Default)]
struct RouterState {
    subscribers: Vec<SubscriberEntry>,
    liveliness_subscribers: Vec<SubscriberEntry>,
    queryables: Vec<QueryableEntry>,
    caches: Vec<CacheEntry>,
    /// Live tokens: token id -> key expression. Kept synchronously so seed
    /// queries see every token declared before them.
    tokens: HashMap<u64, KeyExpr>,
    /// Router-mode sessions currently open, by zid.
    routers: HashMap<u64, String>,
}

enum Event {
    Put {
        keyexpr: KeyExpr,
        payload: ZBytes,
        attachment: Option<Vec<u8>>,
    },
    Liveliness {
        keyexpr: KeyExpr,
        kind: SampleKind,
    },
    Query {
        keyexpr: KeyExpr,
        payload: ZBytes,
        attachment: Option<Vec<u8>>,
        reply_to: Arc<ReplyCallback>,
    },
}

pub(super) struct Router {
    state: Mutex<RouterState>,
    queue: Sender<Event>,
    next_id: AtomicU64,
}

impl Router {
    /// The per-process router, spawning the dispatch thread on first use.
    pub(super) fn global() -> &'static Router {
        static ROUTER: OnceLock<Router> = OnceLock::new();
        ROUTER.get_or_init(|| {
            let (tx, rx) = unbounded::<Event>();
            std::thread::Builder::new()
                .name("fabric-dispatch".to_string())
                .spawn(move || {
                    while let Ok(event) = rx.recv() {
                        Router::global().dispatch(event);
                    }
                })
                .expect("spawning the fabric dispatch thread must succeed");
            Router {
                state: Mutex::new(RouterState::default()),
                queue: tx,
                next_id: AtomicU64::new(1),
            }
        })
    }

    pub(super) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn dispatch(&self, event: Event) {
        match event {
            Event::Put {
                keyexpr,
                payload,
                attachment,
            } => {
                self.retain_in_caches(&keyexpr, &payload, &attachment);
                let callbacks = self.matching_subscribers(&keyexpr, false);
                for callback in callbacks {
                    (callback.as_ref())(Sample {
                        keyexpr: keyexpr.clone(),
                        payload: payload.clone(),
                        attachment: attachment.clone(),
                        kind: SampleKind::Put,
                        received_ns: now_ns(),
                    });
                }
            }
            Event::Liveliness { keyexpr, kind } => {
                let callbacks = self.matching_subscribers(&keyexpr, true);
                for callback in callbacks {
                    (callback.as_ref())(Sample {
                        keyexpr: keyexpr.clone(),
                        payload: ZBytes::empty(),
                        attachment: None,
                        kind,
                        received_ns: now_ns(),
                    });
                }
            }
            Event::Query {
                keyexpr,
                payload,
                attachment,
                reply_to,
            } => {
                let callbacks: Vec<Arc<QueryCallback>> = {
                    let state = self.state.lock();
                    state
                        .queryables
                        .iter()
                        .filter(|entry| entry.keyexpr.intersects(&keyexpr))
                        .map(|entry| Arc::clone(&entry.callback))
                        .collect()
                };
                for callback in callbacks {
                    (callback.as_ref())(Query {
                        keyexpr: keyexpr.clone(),
                        payload: payload.clone(),
                        attachment: attachment.clone(),
                        reply_to: Arc::clone(&reply_to),
                    });
                }
            }
        }
    }

    fn matching_subscribers(&self, keyexpr: &KeyExpr, liveliness: bool) -> Vec<Arc<SampleCallback>> {
        let state = self.state.lock();
        let entries = if liveliness {
            &state.liveliness_subscribers
        } else {
            &state.subscribers
        };
        entries
            .iter()
            .filter(|entry| entry.keyexpr.intersects(keyexpr))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    // ---- registration (synchronous) ----

    pub(super) fn add_subscriber(
        &self,
        keyexpr: KeyExpr,
        callback: Arc<SampleCallback>,
        liveliness: bool,
    ) -> u64 {
        let id = self.next_id();
        let entry = SubscriberEntry {
            id,
            keyexpr,
            callback,
        };
        let mut state = self.state.lock();
        if liveliness {
            state.liveliness_subscribers.push(entry);
        } else {
            state.subscribers.push(entry);
        }
        id
    }

    pub(super) fn remove_subscriber(&self, id: u64, liveliness: bool) {
        let mut state = self.state.lock();
        let entries = if liveliness {
            &mut state.liveliness_subscribers
        } else {
            &mut state.subscribers
        };
        entries.retain(|entry| entry.id != id);
    }

    fn retain_in_caches(&self, keyexpr: &KeyExpr, payload: &ZBytes, attachment: &Option<Vec<u8>>) {
        let mut state = self.state.lock();
        for cache in state
            .caches
            .iter_mut()
            .filter(|cache| cache.keyexpr.intersects(keyexpr))
        {
            if cache.ring.len() >= cache.history {
                cache.ring.pop_front();
            }
            cache.ring.push_back((payload.clone(), attachment.clone()));
        }
    }

    pub(super) fn add_cache(&self, keyexpr: KeyExpr, history: usize) -> u64 {
        let id = self.next_id();
        self.state.lock().caches.push(CacheEntry {
            id,
            keyexpr,
            history: history.max(1),
            ring: std::collections::VecDeque::new(),
        });
        id
    }

    pub(super) fn remove_cache(&self, id: u64) {
        self.state.lock().caches.retain(|cache| cache.id != id);
    }

    /// Samples currently retained by a publication cache, oldest first.
    pub(super) fn cache_history(&self, id: u64) -> Vec<(ZBytes, Option<Vec<u8>>)> {
        let state = self.state.lock();
        state
            .caches
            .iter()
            .find(|cache| cache.id == id)
            .map(|cache| cache.ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(super) fn add_queryable(&self, keyexpr: KeyExpr, callback: Arc<QueryCallback>) -> u64 {
        let id = self.next_id();
        let mut state = self.state.lock();
        state.queryables.push(QueryableEntry {
            id,
            keyexpr,
            callback,
        });
        id
    }

    pub(super) fn remove_queryable(&self, id: u64) {
        let mut state = self.state.lock();
        state.queryables.retain(|entry| entry.id != id);
    }

    pub(super) fn declare_token(&self, keyexpr: KeyExpr) -> u64 {
        let id = self.next_id();
        self.state.lock().tokens.insert(id, keyexpr.clone());
        let _ = self.queue.send(Event::Liveliness {
            keyexpr,
            kind: SampleKind::Put,
        });
        id
    }

    pub(super) fn undeclare_token(&self, id: u64) {
        let removed = self.state.lock().tokens.remove(&id);
        if let Some(keyexpr) = removed {
            let _ = self.queue.send(Event::Liveliness {
                keyexpr,
                kind: SampleKind::Delete,
            });
        }
    }

    /// Snapshot of live token key expressions intersecting `keyexpr`.
    pub(super) fn live_tokens(&self, keyexpr: &KeyExpr) -> Vec<KeyExpr> {
        let state = self.state.lock();
        state
            .tokens
            .values()
            .filter(|token| token.intersects(keyexpr))
            .cloned()
            .collect()
    }

    pub(super) fn add_router_session(&self, id: u64, zid: String) {
        self.state.lock().routers.insert(id, zid);
    }

    pub(super) fn remove_router_session(&self, id: u64) {
        self.state.lock().routers.remove(&id);
    }

    pub(super) fn router_zids(&self) -> Vec<String> {
        self.state.lock().routers.values().cloned().collect()
    }

    // ---- delivery (queued) ----

    pub(super) fn put(&self, keyexpr: KeyExpr, payload: ZBytes, attachment: Option<Vec<u8>>) {
        let _ = self.queue.send(Event::Put {
            keyexpr,
            payload,
            attachment,
        });
    }

    pub(super) fn query(
        &self,
        keyexpr: KeyExpr,
        payload: ZBytes,
        attachment: Option<Vec<u8>>,
        reply_to: Arc<ReplyCallback>,
    ) {
        let _ = self.queue.send(Event::Query {
            keyexpr,
            payload,
            attachment,
            reply_to,
        });
    }
}
