// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service data: fabric queryable, request queue, reply path.

use super::RequestId;
use crate::attachment::{Attachment, GID_SIZE};
use crate::buffer_pool::BufferPool;
use crate::events::{DataCallbackManager, EventCallback, EventsManager};
use crate::fabric::{now_ns, Query, Queryable, Session, ZBytes};
use crate::graph::GraphCache;
use crate::liveliness::Entity;
use crate::payload::Payload;
use crate::queue::MessageQueue;
use crate::type_support::TypeSupport;
use crate::wait::{WaitSetState, Waitable};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

struct QueuedQuery {
    query: Query,
    attachment: Attachment,
    received_ns: i64,
}

/// Owns the fabric queryable, liveliness token, request queue and pending
/// reply map for one service entity.
pub struct ServiceData {
    entity: Entity,
    gid: [u8; GID_SIZE],
    queue: MessageQueue<QueuedQuery>,
    /// Requests taken but not yet answered, by (client gid, sequence).
    pending: Mutex<HashMap<RequestId, Query>>,
    events: Arc<EventsManager>,
    data_callbacks: DataCallbackManager,
    request_support: Arc<dyn TypeSupport>,
    response_support: Arc<dyn TypeSupport>,
    pool: Arc<BufferPool>,
    graph: Arc<GraphCache>,
    queryable: Mutex<Option<Queryable>>,
    token: Mutex<Option<crate::fabric::LivelinessToken>>,
    is_shutdown: AtomicBool,
}

impl ServiceData {
    pub(crate) fn new(
        session: &Arc<Session>,
        graph: Arc<GraphCache>,
        pool: Arc<BufferPool>,
        entity: Entity,
        request_support: Arc<dyn TypeSupport>,
        response_support: Arc<dyn TypeSupport>,
    ) -> Result<Arc<Self>> {
        let topic = entity.topic_info().ok_or(Error::DeclareFailed("queryable"))?;
        let service_keyexpr = entity
            .topic_keyexpr()
            .ok_or(Error::DeclareFailed("queryable"))?;

        let data = Arc::new(Self {
            gid: entity.source_gid(),
            queue: MessageQueue::new(topic.qos.depth as usize),
            pending: Mutex::new(HashMap::new()),
            events: EventsManager::new(),
            data_callbacks: DataCallbackManager::new(),
            request_support,
            response_support,
            pool,
            graph: Arc::clone(&graph),
            queryable: Mutex::new(None),
            token: Mutex::new(None),
            is_shutdown: AtomicBool::new(false),
            entity: entity.clone(),
        });

        let weak: Weak<ServiceData> = Arc::downgrade(&data);
        let queryable = session.declare_queryable(
            service_keyexpr,
            Arc::new(move |query: Query| {
                if let Some(data) = weak.upgrade() {
                    data.on_query(query);
                }
            }),
        )?;
        *data.queryable.lock() = Some(queryable);

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

    /// Fabric callback: decode the request attachment and enqueue.
    fn on_query(&self, query: Query) {
        if self.is_shutdown.load(Ordering::Acquire) {
            return;
        }
        let attachment = match query.attachment().map(Attachment::decode) {
            Some(Ok(attachment)) => attachment,
            _ => {
                log::warn!("[service] dropping query with bad attachment");
                return;
            }
        };

        if self
            .queue
            .push(QueuedQuery {
                query,
                attachment,
                received_ns: now_ns(),
            })
            .is_some()
        {
            log::warn!(
                "[service] request queue depth {} reached, discarding oldest",
                self.queue.capacity()
            );
        }
        self.data_callbacks.trigger();
    }

    /// Take the oldest pending request. The request stays tracked until
    /// [`Self::send_response`] consumes its id.
    pub fn take_request(&self) -> Result<Option<(Box<dyn Any + Send>, RequestId)>> {
        let Some(queued) = self.queue.pop() else {
            return Ok(None);
        };
        let payload = Payload::new(queued.query.payload());
        let message = self.request_support.deserialize(payload.data())?;
        let request_id = RequestId {
            writer_gid: queued.attachment.source_gid,
            sequence_number: queued.attachment.sequence_number,
        };
        self.pending.lock().insert(request_id, queued.query);
        Ok(Some((message, request_id)))
    }

    /// Serialize and send the response for a previously taken request. The
    /// reply rides the request's sequence number and this service's GID.
    pub fn send_response(&self, request_id: RequestId, message: &dyn Any) -> Result<()> {
        if self.is_shutdown.load(Ordering::Acquire) {
            return Err(Error::AlreadyShutdown);
        }
        let query = self
            .pending
            .lock()
            .remove(&request_id)
            .ok_or(Error::NotFound)?;

        let size = self.response_support.encoded_len(message)?;
        let mut buffer = self.pool.allocate(size).ok_or(Error::BufferExhausted)?;
        let payload = match self.response_support.serialize(message, &mut buffer.data) {
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

        let attachment =
            Attachment::new(request_id.sequence_number, now_ns(), self.gid).encode();
        query.reply(payload, Some(attachment));
        Ok(())
    }

    /// Install the executor's new-request callback.
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

    /// Undeclare queryable, token and graph registration. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.graph.unregister_local(self.entity.id());
        self.token.lock().take();
        self.queryable.lock().take();
        self.pending.lock().clear();
        Ok(())
    }
}

impl Waitable for ServiceData {
    fn attach(&self, wait_set: &Arc<WaitSetState>) -> bool {
        self.queue.attach(wait_set)
    }

    fn detach(&self) -> bool {
        self.queue.detach()
    }
}

impl Drop for ServiceData {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
