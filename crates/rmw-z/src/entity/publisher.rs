// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher data: serialization, attachment stamping, fabric put.

use crate::attachment::{Attachment, GID_SIZE};
use crate::buffer_pool::BufferPool;
use crate::events::EventsManager;
use crate::fabric::{now_ns, PublicationCache, Publisher, Session, ZBytes};
use crate::graph::GraphCache;
use crate::liveliness::Entity;
use crate::qos::Durability;
use crate::shm::ShmContext;
use crate::type_support::TypeSupport;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

struct PublisherState {
    sequence_number: i64,
    is_shutdown: bool,
}

/// Owns the fabric publisher, liveliness token and events manager for one
/// publisher entity.
pub struct PublisherData {
    entity: Entity,
    gid: [u8; GID_SIZE],
    publisher: Publisher,
    /// Present when durability is transient-local.
    pub_cache: Mutex<Option<PublicationCache>>,
    token: Mutex<Option<crate::fabric::LivelinessToken>>,
    events: Arc<EventsManager>,
    type_support: Arc<dyn TypeSupport>,
    pool: Arc<BufferPool>,
    shm: Option<Arc<ShmContext>>,
    graph: Arc<GraphCache>,
    state: Mutex<PublisherState>,
}

impl PublisherData {
    pub(crate) fn new(
        session: &Arc<Session>,
        graph: Arc<GraphCache>,
        pool: Arc<BufferPool>,
        shm: Option<Arc<ShmContext>>,
        entity: Entity,
        type_support: Arc<dyn TypeSupport>,
    ) -> Result<Arc<Self>> {
        let topic = entity.topic_info().ok_or(Error::DeclareFailed("publisher"))?;
        let topic_keyexpr = entity
            .topic_keyexpr()
            .ok_or(Error::DeclareFailed("publisher"))?;

        let publisher = session.declare_publisher(topic_keyexpr.clone())?;

        // Transient-local publishers retain history for late joiners.
        let pub_cache = if topic.qos.durability == Durability::TransientLocal {
            Some(session.declare_publication_cache(topic_keyexpr, topic.qos.depth as usize)?)
        } else {
            None
        };

        let events = EventsManager::new();
        graph.register_local(&entity, Arc::clone(&events));

        let token = session
            .declare_liveliness_token(entity.keyexpr())
            .map_err(|_| {
                graph.unregister_local(entity.id());
                Error::LivelinessDeclareFailed
            })?;

        Ok(Arc::new(Self {
            gid: entity.source_gid(),
            entity,
            publisher,
            pub_cache: Mutex::new(pub_cache),
            token: Mutex::new(Some(token)),
            events,
            type_support,
            pool,
            shm,
            graph,
            state: Mutex::new(PublisherState {
                sequence_number: 1,
                is_shutdown: false,
            }),
        }))
    }

    /// Serialize `message`, stamp the attachment and hand both to the
    /// fabric. The sequence number is consumed once serialization
    /// succeeded, whether or not the fabric accepts the sample.
    pub fn publish(&self, message: &dyn Any) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_shutdown {
            log::error!("[publisher] publish on shut-down publisher");
            return Err(Error::AlreadyShutdown);
        }

        let size = self.type_support.encoded_len(message)?;
        let payload = self.serialize_payload(message, size)?;

        let sequence_number = state.sequence_number;
        state.sequence_number += 1;

        let attachment = Attachment::new(sequence_number, now_ns(), self.gid).encode();
        self.publisher
            .put(payload, Some(attachment))
            .map_err(|_| Error::PublishFailed)
    }

    /// Publish bytes that are already serialized.
    pub fn publish_serialized(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_shutdown {
            return Err(Error::AlreadyShutdown);
        }

        let sequence_number = state.sequence_number;
        state.sequence_number += 1;

        let attachment = Attachment::new(sequence_number, now_ns(), self.gid).encode();
        self.publisher
            .put(ZBytes::from(bytes), Some(attachment))
            .map_err(|_| Error::PublishFailed)
    }

    /// Pick SHM when it is enabled and the message crosses the threshold,
    /// otherwise lease from the buffer pool.
    fn serialize_payload(&self, message: &dyn Any, size: usize) -> Result<ZBytes> {
        if let Some(shm) = &self.shm {
            if size >= shm.msgsize_threshold() {
                match shm.allocate(size) {
                    Some(mut shm_buffer) => {
                        let written = self
                            .type_support
                            .serialize(message, &mut shm_buffer.data)?;
                        shm_buffer.data.truncate(written);
                        return Ok(ZBytes::from_vec(shm_buffer.data));
                    }
                    None => {
                        log::warn!(
                            "[publisher] SHM allocation of {} bytes declined, using the pool",
                            size
                        );
                    }
                }
            }
        }

        let mut buffer = self.pool.allocate(size).ok_or(Error::BufferExhausted)?;
        match self.type_support.serialize(message, &mut buffer.data) {
            Ok(written) => {
                let payload = ZBytes::from(&buffer.data[..written]);
                self.pool.release(buffer);
                Ok(payload)
            }
            Err(err) => {
                self.pool.release(buffer);
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    #[must_use]
    pub fn gid(&self) -> [u8; GID_SIZE] {
        self.gid
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventsManager> {
        &self.events
    }

    /// Next sequence number that `publish` would assign.
    #[must_use]
    pub fn next_sequence_number(&self) -> i64 {
        self.state.lock().sequence_number
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().is_shutdown
    }

    /// Undeclare the token, cache and graph registration. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_shutdown {
            return Ok(());
        }
        state.is_shutdown = true;
        drop(state);

        self.graph.unregister_local(self.entity.id());
        self.token.lock().take();
        self.pub_cache.lock().take();
        Ok(())
    }
}

impl Drop for PublisherData {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
