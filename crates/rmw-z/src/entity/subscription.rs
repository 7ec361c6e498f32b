// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscription data: fabric subscriber, bounded sample queue, take path.

use super::MessageInfo;
use crate::attachment::Attachment;
use crate::events::{DataCallbackManager, EventCallback, EventKind, EventsManager};
use crate::fabric::{Sample, Session, Subscriber};
use crate::graph::GraphCache;
use crate::liveliness::Entity;
use crate::payload::Payload;
use crate::qos::History;
use crate::queue::MessageQueue;
use crate::type_support::TypeSupport;
use crate::wait::{WaitSetState, Waitable};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// One received sample waiting to be taken.
struct QueuedSample {
    payload: Payload,
    attachment: Attachment,
    received_ns: i64,
}

/// Owns the fabric subscriber, liveliness token, queue and events manager
/// for one subscription entity.
pub struct SubscriptionData {
    entity: Entity,
    queue: MessageQueue<QueuedSample>,
    events: Arc<EventsManager>,
    data_callbacks: DataCallbackManager,
    type_support: Arc<dyn TypeSupport>,
    graph: Arc<GraphCache>,
    subscriber: Mutex<Option<Subscriber>>,
    token: Mutex<Option<crate::fabric::LivelinessToken>>,
    is_shutdown: AtomicBool,
}

impl SubscriptionData {
    pub(crate) fn new(
        session: &Arc<Session>,
        graph: Arc<GraphCache>,
        entity: Entity,
        type_support: Arc<dyn TypeSupport>,
    ) -> Result<Arc<Self>> {
        let topic = entity
            .topic_info()
            .ok_or(Error::DeclareFailed("subscriber"))?;
        let topic_keyexpr = entity
            .topic_keyexpr()
            .ok_or(Error::DeclareFailed("subscriber"))?;

        let queue = match topic.qos.history {
            History::KeepAll => MessageQueue::unbounded(),
            History::KeepLast => MessageQueue::new(topic.qos.depth as usize),
        };

        let data = Arc::new(Self {
            queue,
            events: EventsManager::new(),
            data_callbacks: DataCallbackManager::new(),
            type_support,
            graph: Arc::clone(&graph),
            subscriber: Mutex::new(None),
            token: Mutex::new(None),
            is_shutdown: AtomicBool::new(false),
            entity: entity.clone(),
        });

        // The fabric callback holds a weak reference: a subscription mid
        // teardown silently drops late samples.
        let weak: Weak<SubscriptionData> = Arc::downgrade(&data);
        let subscriber = session.declare_subscriber(
            topic_keyexpr,
            Arc::new(move |sample: Sample| {
                if let Some(data) = weak.upgrade() {
                    data.on_sample(sample);
                }
            }),
        )?;
        *data.subscriber.lock() = Some(subscriber);

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

    /// Fabric callback: decode, enqueue, notify. Runs on fabric threads.
    fn on_sample(&self, sample: Sample) {
        if self.is_shutdown.load(Ordering::Acquire) {
            return;
        }

        let attachment = match sample.attachment.as_deref().map(Attachment::decode) {
            Some(Ok(attachment)) => attachment,
            Some(Err(err)) => {
                log::warn!("[subscription] dropping sample: {}", err);
                self.events.update_status(EventKind::MessageLost, 1);
                return;
            }
            None => {
                log::warn!("[subscription] dropping sample without attachment");
                self.events.update_status(EventKind::MessageLost, 1);
                return;
            }
        };

        let dropped = self.queue.push(QueuedSample {
            payload: Payload::new(&sample.payload),
            attachment,
            received_ns: sample.received_ns,
        });
        if dropped.is_some() {
            log::warn!(
                "[subscription] queue depth {} reached on {:?}, discarding oldest",
                self.queue.capacity(),
                self.entity.topic_info().map(|topic| topic.name.as_str())
            );
            self.events.update_status(EventKind::MessageLost, 1);
        }

        self.data_callbacks.trigger();
    }

    /// Non-blocking take of the oldest queued message.
    pub fn take(&self) -> Result<Option<(Box<dyn Any + Send>, MessageInfo)>> {
        let Some(queued) = self.queue.pop() else {
            return Ok(None);
        };
        let message = self.type_support.deserialize(queued.payload.data())?;
        Ok(Some((message, info_for(&queued))))
    }

    /// Non-blocking take of the raw serialized bytes.
    pub fn take_serialized(&self) -> Option<(Vec<u8>, MessageInfo)> {
        let queued = self.queue.pop()?;
        Some((queued.payload.data().to_vec(), info_for(&queued)))
    }

    /// Install the executor's new-data callback (drains coalesced counts).
    pub fn set_data_callback(&self, callback: Option<EventCallback>) {
        self.data_callbacks.set_callback(callback);
    }

    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventsManager> {
        &self.events
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }

    /// Undeclare subscriber, token and graph registration. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.graph.unregister_local(self.entity.id());
        self.token.lock().take();
        self.subscriber.lock().take();
        Ok(())
    }
}

fn info_for(queued: &QueuedSample) -> MessageInfo {
    MessageInfo {
        source_timestamp: queued.attachment.source_timestamp,
        received_timestamp: queued.received_ns,
        sequence_number: queued.attachment.sequence_number,
        publisher_gid: queued.attachment.source_gid,
    }
}

impl Waitable for SubscriptionData {
    fn attach(&self, wait_set: &Arc<WaitSetState>) -> bool {
        self.queue.attach(wait_set)
    }

    fn detach(&self) -> bool {
        self.queue.detach()
    }
}

impl Drop for SubscriptionData {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
