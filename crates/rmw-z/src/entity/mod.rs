// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity data: the objects behind node, publisher, subscription, service
//! and client handles.
//!
//! Each entity owns its fabric primitives, its liveliness token and its
//! events manager; subscriptions, services and clients additionally own a
//! bounded queue fed from fabric callback threads. Creation registers the
//! entity with the local graph cache *before* the token is declared so the
//! echoed token finds the events manager; shutdown reverses that order and
//! is idempotent.

mod client;
mod node;
mod publisher;
mod service;
mod subscription;

pub use client::ClientData;
pub use node::NodeData;
pub use publisher::PublisherData;
pub use service::ServiceData;
pub use subscription::SubscriptionData;

use crate::attachment::GID_SIZE;

/// Metadata returned with every taken message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    /// Publisher-side timestamp from the attachment, ns since Unix epoch.
    pub source_timestamp: i64,
    /// Local timestamp recorded at enqueue, ns since Unix epoch.
    pub received_timestamp: i64,
    /// Publisher-assigned sequence number.
    pub sequence_number: i64,
    /// GID of the publishing entity.
    pub publisher_gid: [u8; GID_SIZE],
}

/// Correlation id for an RPC request/response pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    /// GID of the requesting or responding endpoint.
    pub writer_gid: [u8; GID_SIZE],
    /// Client-assigned sequence number.
    pub sequence_number: i64,
}
