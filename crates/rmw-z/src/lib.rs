// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # rmw-z - ROS 2 middleware core over a key-expression fabric
//!
//! This crate implements the core of a ROS 2 middleware adapter: nodes,
//! publishers, subscriptions, services and clients are mapped onto a generic
//! key-expression messaging fabric that provides sessions, routed samples
//! with attachments, liveliness tokens and distributed queries.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        Context                               |
//! |  session | graph cache | liveliness subscriber | SHM | pool  |
//! +--------------------------------------------------------------+
//! |                        NodeData                              |
//! |  PublisherData | SubscriptionData | ServiceData | ClientData |
//! +--------------------------------------------------------------+
//! |                        Fabric                                |
//! |  key expressions | samples | liveliness | queries            |
//! +--------------------------------------------------------------+
//! ```
//!
//! Discovery is carried entirely by liveliness tokens: every entity encodes
//! its descriptor into an admin-space key expression and declares a token on
//! it. Peers subscribe to the admin keyspace and replay token puts/deletes
//! into their local [`graph::GraphCache`], so every peer converges on the
//! same view of the graph without a separate registry.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Context`] | Owns the session and the graph cache, root of the lifecycle |
//! | [`NodeData`] | Owns the entities created under one node |
//! | [`PublisherData`] | Publishes serialized messages with an attachment |
//! | [`SubscriptionData`] | Receives samples into a bounded queue |
//! | [`WaitSet`] | Blocks until any attached condition triggers |

pub mod attachment;
pub mod buffer_pool;
pub mod config;
pub mod context;
pub mod entity;
pub mod events;
/// In-process key-expression fabric (sessions, samples, liveliness, queries).
pub mod fabric;
pub mod graph;
pub mod liveliness;
pub mod payload;
pub mod qos;
pub mod queue;
pub mod shm;
pub mod type_support;
pub mod wait;

pub use config::SessionConfig;
pub use context::Context;
pub use entity::{
    ClientData, MessageInfo, NodeData, PublisherData, RequestId, ServiceData, SubscriptionData,
};
pub use events::{EventKind, EventStatus, EventsManager};
pub use graph::GraphCache;
pub use qos::{Durability, History, QosProfile, Reliability};
pub use type_support::{Message, TypeSupport, TypedSupport};
pub use wait::{GuardCondition, WaitSet, Waitable};

/// Errors returned by rmw-z operations.
#[derive(Debug)]
pub enum Error {
    // Bootstrap
    /// Opening the fabric session failed.
    SessionOpenFailed(String),
    /// No router reachable after the configured number of attempts.
    RouterUnreachable(u64),
    /// Shared-memory provider initialization failed.
    ShmInitFailed(String),

    // Declaration
    /// An entity with the same id already exists.
    EntityExists,
    /// Declaring a liveliness token failed.
    LivelinessDeclareFailed,
    /// Declaring a fabric primitive failed (publisher, subscriber, queryable).
    DeclareFailed(&'static str),

    // Runtime
    /// The fabric rejected a publication.
    PublishFailed,
    /// Operation on a context or entity that was already shut down.
    AlreadyShutdown,
    /// Requested node or entity does not exist.
    NotFound,
    /// Attachment bytes did not match the expected layout.
    MalformedAttachment(&'static str),
    /// Message serialization or deserialization failed.
    SerializationError,
    /// The buffer pool could not serve the allocation within its cap.
    BufferExhausted,
    /// A blocking operation ran out of time.
    Timeout,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SessionOpenFailed(msg) => write!(f, "Failed to open session: {}", msg),
            Error::RouterUnreachable(attempts) => {
                write!(f, "Unable to reach a router after {} attempts", attempts)
            }
            Error::ShmInitFailed(msg) => write!(f, "SHM provider init failed: {}", msg),
            Error::EntityExists => write!(f, "Entity already exists"),
            Error::LivelinessDeclareFailed => write!(f, "Liveliness token declaration failed"),
            Error::DeclareFailed(what) => write!(f, "Failed to declare {}", what),
            Error::PublishFailed => write!(f, "Unable to publish message"),
            Error::AlreadyShutdown => write!(f, "Already shut down"),
            Error::NotFound => write!(f, "Not found"),
            Error::MalformedAttachment(what) => write!(f, "Malformed attachment: {}", what),
            Error::SerializationError => write!(f, "Serialization failed"),
            Error::BufferExhausted => write!(f, "Buffer pool exhausted"),
            Error::Timeout => write!(f, "Timed out"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for API results using the public [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// rmw-z version string.
pub const VERSION: &str = "0.2.0";
