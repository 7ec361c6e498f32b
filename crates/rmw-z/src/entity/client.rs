// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client data: query issuing, reply queue, sequence correlation.

use super::RequestId;
use crate::attachment::{Attachment, GID_SIZE};
use crate::buffer_pool::BufferPool;
use crate::events::{DataCallbackManager, EventCallback, EventsManager};
use crate::fabric::{now_ns, KeyExpr, Reply, Session, ZBytes};
use crate::graph::GraphCache;
use crate::liveliness::Entity;
use crate::payload::Payload;
use crate::queue::MessageQueue;
use crate::type_support::TypeSupport;
use crate::wait::{WaitSetState, Waitable};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

struct QueuedReply {
    payload: Payload,
    attachment: Attachment,
    received_ns: i64,
}

struct ClientState {
    sequence_number: i64,
    /// Sequence numbers of requests still awaiting their reply.
    pending: HashSet<i64>,
}

/// Owns the liveliness token, reply queue and pending-request set for one
/// client entity.
pub struct ClientData {
    entity: Entity,
    gid: [u8; GID_SIZE],
    service_keyexpr: KeyExpr,
    session: Arc<Session>,
    queue: MessageQueue<QueuedReply>,
    state: Mutex<ClientState>,
    events: Arc<EventsManager>,
    data_callbacks: DataCallbackManager,
    request_support: Arc<dyn TypeSupport>,
    response_support: Arc<dyn TypeSupport>,
    pool: Arc<BufferPool>,
    graph: Arc<GraphCache>,
    token: Mutex<Option<crate::fabric::LivelinessToken>>,
    is_shutdown: AtomicBool,
}

impl ClientData {
    pub(crate) fn new(
        session: &Arc<Session>,
        graph: Arc<GraphCache>,
        pool: Arc<BufferPool>,
        entity: Entity,
        request_support: Arc<dyn TypeSupport>,
        response_support: Arc<dyn TypeSupport>,
    ) -> Result<Arc<Self>> {
        let topic = entity.topic_info().ok_or(Error::DeclareFailed("client"))?;
        let service_keyexpr = entity
            .topic_keyexpr()
            .ok_or(Error::DeclareFailed("client"))?;

        let data = Arc::new(Self {
            gid: entity.source_gid(),
            service_keyexpr,
            session: Arc::clone(session),
            queue: MessageQueue::new(topic.qos.depth as usize),
            state: Mutex::new(ClientState {
                sequence_number: 1,
                pending: HashSet::new(),
            }),
            events: EventsManager::new(),
            data_callbacks: DataCallbackManager::new(),
            request_support,
            response_support,
            pool,
            graph: Arc::clone(&graph),
            token: Mutex::new(None),
            is_shutdown: AtomicBool::new(false),
            entity: entity.clone(),
        });

        graph.register_local(&entity, Arc::clone(&data.events));
        let token = session
            .declare_liveliness_token(entity.keyexpr())
            .map_err(|_| {
                graph.unregister_local(entity.id());
                Error::LivelinessDeclareFailed
            })?;
        *data.token.lock() = Some(token);

        Ok(data)
    }

    /// Serialize and send a request, returning its sequence number. The
    /// reply arrives asynchronously in the client's reply queue.
    pub fn send_request(self: &Arc<Self>, message: &dyn Any) -> Result<i64> {
        if self.is_shutdown.load(Ordering::Acquire) {
            return Err(Error::AlreadyShutdown);
        }

        let size = self.request_support.encoded_len(message)?;
        let mut buffer = self.pool.allocate(size).ok_or(Error::BufferExhausted)?;
        let payload = match self.request_support.serialize(message, &mut buffer.data) {
            Ok(written) => {
                let payload = ZBytes::from(&buffer.data[..written]);
                self.pool.release(buffer);
                payload
            }
            Err(err) => {
                self.pool.release(buffer);
                return Err(err);
            }
        };

        let sequence_number = {
            let mut state = self.state.lock();
            let sequence_number = state.sequence_number;
            state.sequence_number += 1;
            state.pending.insert(sequence_number);
            sequence_number
        };

        let attachment = Attachment::new(sequence_number, now_ns(), self.gid).encode();
        let weak: Weak<ClientData> = Arc::downgrade(self);
        self.session.get(
            self.service_keyexpr.clone(),
            payload,
            Some(attachment),
            Arc::new(move |reply: Reply| {
                if let Some(data) = weak.upgrade() {
                    data.on_reply(reply);
                }
            }),
        )?;

        Ok(sequence_number)
    }

    /// Fabric callback: decode the reply attachment and enqueue.
    fn on_reply(&self, reply: Reply) {
        if self.is_shutdown.load(Ordering::Acquire) {
            return;
        }
        let attachment = match Attachment::decode(reply.attachment.as_deref().unwrap_or(&[])) {
            Ok(attachment) => attachment,
            Err(err) => {
                log::warn!("[client] dropping reply: {}", err);
                return;
            }
        };

        if self
            .queue
            .push(QueuedReply {
                payload: Payload::new(&reply.payload),
                attachment,
                received_ns: reply.received_ns,
            })
            .is_some()
        {
            log::warn!(
                "[client] reply queue depth {} reached, discarding oldest",
                self.queue.capacity()
            );
        }
        self.data_callbacks.trigger();
    }

    /// Take the oldest reply, mapping its sequence number back to the
    /// pending request. Replies without a pending request are discarded.
    pub fn take_response(&self) -> Result<Option<(Box<dyn Any + Send>, RequestId)>> {
        loop {
            let Some(queued) = self.queue.pop() else {
                return Ok(None);
            };
            let sequence_number = queued.attachment.sequence_number;
            if !self.state.lock().pending.remove(&sequence_number) {
                log::warn!(
                    "[client] discarding reply for unknown request {}",
                    sequence_number
                );
                continue;
            }
            let message = self.response_support.deserialize(queued.payload.data())?;
            let request_id = RequestId {
                writer_gid: queued.attachment.source_gid,
                sequence_number,
            };
            return Ok(Some((message, request_id)));
        }
    }

    /// Whether any request is still awaiting its reply.
    #[must_use]
    pub fn has_pending_requests(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    /// Install the executor's new-reply callback.
    pub fn set_data_callback(&self, callback: Option<EventCallback>) {
        self.data_callbacks.set_callback(callback);
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

    /// Undeclare the token and graph registration. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.graph.unregister_local(self.entity.id());
        self.token.lock().take();
        self.state.lock().pending.clear();
        Ok(())
    }
}

impl Waitable for ClientData {
    fn attach(&self, wait_set: &Arc<WaitSetState>) -> bool {
        self.queue.attach(wait_set)
    }

    fn detach(&self) -> bool {
        self.queue.detach()
    }
}

impl Drop for ClientData {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
