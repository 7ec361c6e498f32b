// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fabric sessions and the handles they declare.
//!
//! A session is the unit of peer identity: it owns a `zid`, registers with
//! the process router and tracks every primitive it declared so `close()`
//! can undeclare them all (dropping the liveliness tokens is what announces
//! this peer's death to everyone else).

use super::router::Router;
use super::{KeyExpr, QueryCallback, ReplyCallback, SampleCallback, ZBytes};
use crate::config::SessionConfig;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy)]
enum Declaration {
    Subscriber(u64),
    LivelinessSubscriber(u64),
    Queryable(u64),
    Token(u64),
    Cache(u64),
}

/// An open fabric session.
pub struct Session {
    zid: String,
    session_id: u64,
    config: SessionConfig,
    declarations: Mutex<Vec<Declaration>>,
    closed: AtomicBool,
}

impl Session {
    /// Open a session with the given parsed configuration.
    pub fn open(config: SessionConfig) -> Result<Arc<Session>> {
        static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);
        let serial = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let zid = format!("{:08x}{:08x}", std::process::id(), serial);

        let router = Router::global();
        let session_id = router.next_id();
        if config.router_mode {
            router.add_router_session(session_id, zid.clone());
        }

        log::debug!("[fabric] session {} opened (router={})", zid, config.router_mode);
        Ok(Arc::new(Session {
            zid,
            session_id,
            config,
            declarations: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }

    /// Session identifier, unique across peers.
    #[must_use]
    pub fn zid(&self) -> &str {
        &self.zid
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Zids of router-mode peers currently reachable.
    #[must_use]
    pub fn routers(&self) -> Vec<String> {
        Router::global().router_zids()
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::AlreadyShutdown);
        }
        Ok(())
    }

    fn record(&self, declaration: Declaration) {
        self.declarations.lock().push(declaration);
    }

    /// Declare a publisher on a concrete key expression.
    pub fn declare_publisher(self: &Arc<Self>, keyexpr: KeyExpr) -> Result<Publisher> {
        self.check_open()?;
        if !keyexpr.is_concrete() {
            return Err(Error::DeclareFailed("publisher"));
        }
        Ok(Publisher {
            session: Arc::clone(self),
            keyexpr,
        })
    }

    /// Declare a subscriber; `callback` runs on the fabric dispatch thread.
    pub fn declare_subscriber(
        self: &Arc<Self>,
        keyexpr: KeyExpr,
        callback: Arc<SampleCallback>,
    ) -> Result<Subscriber> {
        self.check_open()?;
        let id = Router::global().add_subscriber(keyexpr, callback, false);
        self.record(Declaration::Subscriber(id));
        Ok(Subscriber { id })
    }

    /// Declare a liveliness subscriber over (typically wildcarded) `keyexpr`.
    pub fn declare_liveliness_subscriber(
        self: &Arc<Self>,
        keyexpr: KeyExpr,
        callback: Arc<SampleCallback>,
    ) -> Result<LivelinessSubscriber> {
        self.check_open()?;
        let id = Router::global().add_subscriber(keyexpr, callback, true);
        self.record(Declaration::LivelinessSubscriber(id));
        Ok(LivelinessSubscriber { id })
    }

    /// Declare a queryable; `callback` runs on the fabric dispatch thread.
    pub fn declare_queryable(
        self: &Arc<Self>,
        keyexpr: KeyExpr,
        callback: Arc<QueryCallback>,
    ) -> Result<Queryable> {
        self.check_open()?;
        let id = Router::global().add_queryable(keyexpr, callback);
        self.record(Declaration::Queryable(id));
        Ok(Queryable { id })
    }

    /// Declare a publication cache retaining the last `history` samples
    /// published on `keyexpr` (backs transient-local durability).
    pub fn declare_publication_cache(
        self: &Arc<Self>,
        keyexpr: KeyExpr,
        history: usize,
    ) -> Result<PublicationCache> {
        self.check_open()?;
        let id = Router::global().add_cache(keyexpr, history);
        self.record(Declaration::Cache(id));
        Ok(PublicationCache { id })
    }

    /// Declare a liveliness token on `keyexpr`. Peers with a matching
    /// liveliness subscriber observe a Put now and a Delete when the token
    /// is undeclared or the session closes.
    pub fn declare_liveliness_token(self: &Arc<Self>, keyexpr: KeyExpr) -> Result<LivelinessToken> {
        self.check_open()?;
        let id = Router::global().declare_token(keyexpr);
        self.record(Declaration::Token(id));
        Ok(LivelinessToken { id })
    }

    /// One-shot query for the currently live tokens matching `keyexpr`.
    pub fn liveliness_get(&self, keyexpr: &KeyExpr) -> Result<Vec<KeyExpr>> {
        self.check_open()?;
        Ok(Router::global().live_tokens(keyexpr))
    }

    /// Distributed query: every matching queryable receives it, replies are
    /// delivered to `reply_to` on fabric threads.
    pub fn get(
        &self,
        keyexpr: KeyExpr,
        payload: ZBytes,
        attachment: Option<Vec<u8>>,
        reply_to: Arc<ReplyCallback>,
    ) -> Result<()> {
        self.check_open()?;
        Router::global().query(keyexpr, payload, attachment, reply_to);
        Ok(())
    }

    /// Close the session, undeclaring everything it owns. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let router = Router::global();
        router.remove_router_session(self.session_id);
        let declarations = std::mem::take(&mut *self.declarations.lock());
        for declaration in declarations {
            match declaration {
                Declaration::Subscriber(id) => router.remove_subscriber(id, false),
                Declaration::LivelinessSubscriber(id) => router.remove_subscriber(id, true),
                Declaration::Queryable(id) => router.remove_queryable(id),
                Declaration::Token(id) => router.undeclare_token(id),
                Declaration::Cache(id) => router.remove_cache(id),
            }
        }
        log::debug!("[fabric] session {} closed", self.zid);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("zid", &self.zid)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Declared publisher bound to one concrete key expression.
pub struct Publisher {
    session: Arc<Session>,
    keyexpr: KeyExpr,
}

impl Publisher {
    #[must_use]
    pub fn keyexpr(&self) -> &KeyExpr {
        &self.keyexpr
    }

    /// Publish a payload with an optional attachment.
    pub fn put(&self, payload: ZBytes, attachment: Option<Vec<u8>>) -> Result<()> {
        if self.session.is_closed() {
            return Err(Error::PublishFailed);
        }
        Router::global().put(self.keyexpr.clone(), payload, attachment);
        Ok(())
    }
}

/// Declared subscriber handle; undeclares on drop.
pub struct Subscriber {
    id: u64,
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        Router::global().remove_subscriber(self.id, false);
    }
}

/// Declared liveliness subscriber handle; undeclares on drop.
pub struct LivelinessSubscriber {
    id: u64,
}

impl Drop for LivelinessSubscriber {
    fn drop(&mut self) {
        Router::global().remove_subscriber(self.id, true);
    }
}

/// Declared queryable handle; undeclares on drop.
pub struct Queryable {
    id: u64,
}

impl Drop for Queryable {
    fn drop(&mut self) {
        Router::global().remove_queryable(self.id);
    }
}

/// A declared publication cache; undeclares on drop.
pub struct PublicationCache {
    id: u64,
}

impl PublicationCache {
    /// Samples currently retained, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<(ZBytes, Option<Vec<u8>>)> {
        Router::global().cache_history(self.id)
    }
}

impl Drop for PublicationCache {
    fn drop(&mut self) {
        Router::global().remove_cache(self.id);
    }
}

/// A declared liveliness token. Undeclaring (or dropping) announces death.
pub struct LivelinessToken {
    id: u64,
}

impl LivelinessToken {
    /// Explicitly undeclare the token, emitting the Delete sample now.
    pub fn undeclare(self) {
        // Drop does the work.
    }
}

impl Drop for LivelinessToken {
    fn drop(&mut self) {
        Router::global().undeclare_token(self.id);
    }
}
