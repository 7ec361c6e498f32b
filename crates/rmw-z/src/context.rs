// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Context: root of the middleware lifecycle.
//!
//! A context owns exactly one fabric session, the graph cache mirroring
//! every peer's entities, the long-lived liveliness subscriber feeding it,
//! and the registry of nodes created under it. Fabric callback threads
//! reach the context through a `Weak` upgrade; once the context is gone the
//! upgrade fails and the callback returns without side effects, which is
//! what makes the shutdown race benign.

use crate::buffer_pool::BufferPool;
use crate::config::{self, SessionConfig};
use crate::entity::NodeData;
use crate::fabric::{LivelinessSubscriber, Sample, SampleKind, Session};
use crate::graph::GraphCache;
use crate::liveliness::{domain_keyexpr, NodeInfo};
use crate::shm::ShmContext;
use crate::wait::GuardCondition;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Poll period of the router reachability check.
const ROUTER_CHECK_PERIOD: Duration = Duration::from_millis(100);

struct ContextInner {
    domain_id: u32,
    enclave: String,
    session: Arc<Session>,
    graph: Arc<GraphCache>,
    pool: Arc<BufferPool>,
    shm: Mutex<Option<Arc<ShmContext>>>,
    graph_guard: Arc<GuardCondition>,
    graph_subscriber: Mutex<Option<LivelinessSubscriber>>,
    next_entity_id: Arc<AtomicU64>,
    nodes: Mutex<HashMap<u64, Arc<NodeData>>>,
    is_shutdown: AtomicBool,
}

impl ContextInner {
    /// Liveliness subscriber callback. Runs on fabric threads.
    fn on_graph_sample(&self, sample: Sample) {
        if self.is_shutdown.load(Ordering::Acquire) {
            return;
        }
        match sample.kind {
            SampleKind::Put => self.graph.parse_put(sample.keyexpr.as_str(), false),
            SampleKind::Delete => self.graph.parse_del(sample.keyexpr.as_str()),
        }
        self.graph_guard.trigger();
    }
}

/// Owns the session, graph cache and node registry of one middleware
/// instance.
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Open a session and start graph discovery for `domain_id`.
    ///
    /// Construction may block for the optional router check (up to
    /// `ZENOH_ROUTER_CHECK_ATTEMPTS` x 100 ms) plus the liveliness seed
    /// query.
    pub fn new(domain_id: u32, enclave: &str, session_config: SessionConfig) -> Result<Self> {
        let shm_config = session_config.shared_memory.clone();
        let session = Session::open(session_config)
            .map_err(|err| Error::SessionOpenFailed(err.to_string()))?;

        if let Some(attempts) = config::router_check_attempts() {
            let mut reached = false;
            for _ in 0..attempts {
                if !session.routers().is_empty() {
                    reached = true;
                    break;
                }
                std::thread::sleep(ROUTER_CHECK_PERIOD);
            }
            if !reached {
                log::error!(
                    "[context] unable to reach a router after {} attempts",
                    attempts
                );
                return Err(Error::RouterUnreachable(attempts));
            }
        }

        let graph = Arc::new(GraphCache::new(session.zid()));

        // Seed the cache with everything already live, then keep it current
        // through the liveliness subscriber. Duplicate puts from the overlap
        // window are no-ops.
        let keyexpr = domain_keyexpr(domain_id);
        for token in session.liveliness_get(&keyexpr)? {
            graph.parse_put(token.as_str(), true);
        }

        let shm = ShmContext::from_config(&shm_config).map(Arc::new);
        if let Some(shm) = &shm {
            log::debug!(
                "[context] SHM enabled (provider={}, threshold={} bytes)",
                shm.provider_name(),
                shm.msgsize_threshold()
            );
        }

        let inner = Arc::new(ContextInner {
            domain_id,
            enclave: enclave.to_string(),
            session: Arc::clone(&session),
            graph,
            pool: Arc::new(BufferPool::new()),
            shm: Mutex::new(shm),
            graph_guard: Arc::new(GuardCondition::new()),
            graph_subscriber: Mutex::new(None),
            next_entity_id: Arc::new(AtomicU64::new(0)),
            nodes: Mutex::new(HashMap::new()),
            is_shutdown: AtomicBool::new(false),
        });

        let weak: Weak<ContextInner> = Arc::downgrade(&inner);
        let subscriber = session.declare_liveliness_subscriber(
            keyexpr,
            Arc::new(move |sample: Sample| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_graph_sample(sample);
                }
            }),
        )?;
        *inner.graph_subscriber.lock() = Some(subscriber);

        Ok(Self { inner })
    }

    #[must_use]
    pub fn domain_id(&self) -> u32 {
        self.inner.domain_id
    }

    #[must_use]
    pub fn enclave(&self) -> &str {
        &self.inner.enclave
    }

    /// Session id of this peer.
    #[must_use]
    pub fn zid(&self) -> String {
        self.inner.session.zid().to_string()
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    #[must_use]
    pub fn graph(&self) -> &Arc<GraphCache> {
        &self.inner.graph
    }

    /// Guard condition triggered on every graph change.
    #[must_use]
    pub fn graph_guard(&self) -> &Arc<GuardCondition> {
        &self.inner.graph_guard
    }

    #[must_use]
    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.inner.pool
    }

    #[must_use]
    pub fn shm(&self) -> Option<Arc<ShmContext>> {
        self.inner.shm.lock().clone()
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::Acquire)
    }

    /// Issue the next stable entity id.
    #[must_use]
    pub fn next_entity_id(&self) -> u64 {
        self.inner.next_entity_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a node under this context.
    pub fn create_node(&self, namespace: &str, node_name: &str) -> Result<Arc<NodeData>> {
        if self.is_shutdown() {
            return Err(Error::AlreadyShutdown);
        }
        let node_id = self.inner.next_entity_id.fetch_add(1, Ordering::Relaxed);
        let node = NodeData::new(
            Arc::clone(&self.inner.session),
            Arc::clone(&self.inner.graph),
            Arc::clone(&self.inner.pool),
            self.shm(),
            Arc::clone(&self.inner.next_entity_id),
            node_id,
            NodeInfo {
                domain_id: self.inner.domain_id,
                namespace: namespace.to_string(),
                node_name: node_name.to_string(),
                enclave: self.inner.enclave.clone(),
            },
        )?;
        self.inner.nodes.lock().insert(node_id, Arc::clone(&node));
        Ok(node)
    }

    #[must_use]
    pub fn get_node(&self, node_id: u64) -> Option<Arc<NodeData>> {
        self.inner.nodes.lock().get(&node_id).cloned()
    }

    /// Shut down and remove one node.
    pub fn delete_node(&self, node_id: u64) -> Result<()> {
        let node = self
            .inner
            .nodes
            .lock()
            .remove(&node_id)
            .ok_or(Error::NotFound)?;
        node.shutdown()
    }

    /// Shut down every node and close the session. Idempotent.
    ///
    /// Phased: the node set is snapshotted under the registry lock and shut
    /// down outside it, and the session reference is released after every
    /// lock is dropped, so a graph callback racing with shutdown never
    /// deadlocks against the registry.
    pub fn shutdown(&self) -> Result<()> {
        let nodes: Vec<Arc<NodeData>> = self.inner.nodes.lock().values().cloned().collect();
        for node in nodes {
            if let Err(err) = node.shutdown() {
                log::error!(
                    "[context] unable to shut down node {}: {}",
                    node.node_id(),
                    err
                );
            }
        }

        if self.inner.is_shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.nodes.lock().clear();
        self.inner.graph_subscriber.lock().take();
        self.inner.shm.lock().take();

        // Session teardown happens with no context lock held.
        self.inner.session.close();
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("zid", &self.inner.session.zid())
            .field("domain_id", &self.inner.domain_id)
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}
