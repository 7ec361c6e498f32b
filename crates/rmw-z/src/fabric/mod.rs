// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The key-expression messaging fabric the middleware core rides on.
//!
//! The core consumes a narrow capability surface: sessions, declared
//! publishers/subscribers/queryables, liveliness tokens and distributed
//! queries, all addressed by key expression. This module provides that
//! surface backed by a process-global in-memory router, so sessions opened
//! in the same process discover and reach each other exactly like peers on
//! a network would.
//!
//! Delivery model: puts and liveliness changes are serialized through one
//! dispatch thread per process, so subscribers observe samples of a given
//! publisher in publish order, and callbacks run concurrently with user
//! threads - the same threading contract a networked fabric gives.

mod bytes;
mod keyexpr;
mod router;
mod session;

pub use bytes::ZBytes;
pub use keyexpr::KeyExpr;
pub use router::{Query, Reply};
pub use session::{
    LivelinessSubscriber, LivelinessToken, PublicationCache, Publisher, Queryable, Session,
    Subscriber,
};

/// Callback invoked with each sample delivered to a subscriber.
pub type SampleCallback = dyn Fn(Sample) + Send + Sync;
/// Callback invoked with each query delivered to a queryable.
pub type QueryCallback = dyn Fn(Query) + Send + Sync;
/// Callback invoked with each reply to a `get`.
pub type ReplyCallback = dyn Fn(Reply) + Send + Sync;

/// Whether a sample announces presence or departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// New or updated value on the key expression.
    Put,
    /// The key expression is gone (e.g. a liveliness token died).
    Delete,
}

/// A sample delivered to a subscriber callback.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Concrete key expression the sample was published on.
    pub keyexpr: KeyExpr,
    /// Payload bytes. Empty for liveliness samples.
    pub payload: ZBytes,
    /// Raw attachment bytes, when the publisher supplied one.
    pub attachment: Option<Vec<u8>>,
    /// Put or Delete.
    pub kind: SampleKind,
    /// Local receive timestamp, nanoseconds since the Unix epoch.
    pub received_ns: i64,
}

/// Nanoseconds since the Unix epoch, as the fabric stamps samples.
#[must_use]
pub fn now_ns() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}
