// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node data: owns the entities created under one node.

use super::{ClientData, PublisherData, ServiceData, SubscriptionData};
use crate::buffer_pool::BufferPool;
use crate::fabric::Session;
use crate::graph::GraphCache;
use crate::liveliness::{Entity, EntityKind, NodeInfo, TopicInfo};
use crate::qos::QosProfile;
use crate::shm::ShmContext;
use crate::type_support::TypeSupport;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct NodeEntities {
    publishers: HashMap<u64, Arc<PublisherData>>,
    subscriptions: HashMap<u64, Arc<SubscriptionData>>,
    services: HashMap<u64, Arc<ServiceData>>,
    clients: HashMap<u64, Arc<ClientData>>,
}

/// Owns a node's liveliness token and every entity created under it.
/// Entities are keyed by the stable integer ids the context issues.
pub struct NodeData {
    session: Arc<Session>,
    graph: Arc<GraphCache>,
    pool: Arc<BufferPool>,
    shm: Option<Arc<ShmContext>>,
    next_entity_id: Arc<AtomicU64>,
    entity: Entity,
    node_id: u64,
    token: Mutex<Option<crate::fabric::LivelinessToken>>,
    entities: Mutex<NodeEntities>,
    is_shutdown: AtomicBool,
}

impl NodeData {
    #[allow(clippy::too_many_arguments)] // context wiring, one shared handle each
    pub(crate) fn new(
        session: Arc<Session>,
        graph: Arc<GraphCache>,
        pool: Arc<BufferPool>,
        shm: Option<Arc<ShmContext>>,
        next_entity_id: Arc<AtomicU64>,
        node_id: u64,
        node_info: NodeInfo,
    ) -> Result<Arc<Self>> {
        let nid = node_id.to_string();
        let entity = Entity::new(
            session.zid(),
            nid.clone(),
            nid,
            EntityKind::Node,
            node_info,
            None,
        )
        .ok_or(Error::DeclareFailed("node"))?;

        let token = session
            .declare_liveliness_token(entity.keyexpr())
            .map_err(|_| Error::LivelinessDeclareFailed)?;

        Ok(Arc::new(Self {
            session,
            graph,
            pool,
            shm,
            next_entity_id,
            entity,
            node_id,
            token: Mutex::new(Some(token)),
            entities: Mutex::new(NodeEntities::default()),
            is_shutdown: AtomicBool::new(false),
        }))
    }

    #[must_use]
    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }

    fn check_alive(&self) -> Result<()> {
        if self.is_shutdown() || self.session.is_closed() {
            return Err(Error::AlreadyShutdown);
        }
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_entity_id.fetch_add(1, Ordering::Relaxed)
    }

    fn topic_entity(
        &self,
        id: u64,
        kind: EntityKind,
        topic_name: &str,
        type_name: &str,
        type_hash: &str,
        qos: QosProfile,
    ) -> Result<Entity> {
        Entity::new(
            self.session.zid(),
            self.entity.nid(),
            id.to_string(),
            kind,
            self.entity.node_info().clone(),
            Some(TopicInfo {
                name: topic_name.to_string(),
                type_name: type_name.to_string(),
                type_hash: type_hash.to_string(),
                qos,
            }),
        )
        .ok_or(Error::DeclareFailed("entity"))
    }

    /// Create a publisher on `topic_name`.
    pub fn create_publisher(
        &self,
        topic_name: &str,
        type_support: Arc<dyn TypeSupport>,
        qos: QosProfile,
    ) -> Result<Arc<PublisherData>> {
        self.check_alive()?;
        let id = self.next_id();
        let entity = self.topic_entity(
            id,
            EntityKind::Publisher,
            topic_name,
            type_support.type_name(),
            type_support.type_hash(),
            qos,
        )?;
        let data = PublisherData::new(
            &self.session,
            Arc::clone(&self.graph),
            Arc::clone(&self.pool),
            self.shm.clone(),
            entity,
            type_support,
        )?;
        self.entities.lock().publishers.insert(id, Arc::clone(&data));
        Ok(data)
    }

    /// Create a subscription on `topic_name`.
    pub fn create_subscription(
        &self,
        topic_name: &str,
        type_support: Arc<dyn TypeSupport>,
        qos: QosProfile,
    ) -> Result<Arc<SubscriptionData>> {
        self.check_alive()?;
        let id = self.next_id();
        let entity = self.topic_entity(
            id,
            EntityKind::Subscription,
            topic_name,
            type_support.type_name(),
            type_support.type_hash(),
            qos,
        )?;
        let data = SubscriptionData::new(
            &self.session,
            Arc::clone(&self.graph),
            entity,
            type_support,
        )?;
        self.entities
            .lock()
            .subscriptions
            .insert(id, Arc::clone(&data));
        Ok(data)
    }

    /// Create a service server for `service_name`.
    pub fn create_service(
        &self,
        service_name: &str,
        request_support: Arc<dyn TypeSupport>,
        response_support: Arc<dyn TypeSupport>,
        qos: QosProfile,
    ) -> Result<Arc<ServiceData>> {
        self.check_alive()?;
        let id = self.next_id();
        let entity = self.topic_entity(
            id,
            EntityKind::Service,
            service_name,
            request_support.type_name(),
            request_support.type_hash(),
            qos,
        )?;
        let data = ServiceData::new(
            &self.session,
            Arc::clone(&self.graph),
            Arc::clone(&self.pool),
            entity,
            request_support,
            response_support,
        )?;
        self.entities.lock().services.insert(id, Arc::clone(&data));
        Ok(data)
    }

    /// Create a service client for `service_name`.
    pub fn create_client(
        &self,
        service_name: &str,
        request_support: Arc<dyn TypeSupport>,
        response_support: Arc<dyn TypeSupport>,
        qos: QosProfile,
    ) -> Result<Arc<ClientData>> {
        self.check_alive()?;
        let id = self.next_id();
        let entity = self.topic_entity(
            id,
            EntityKind::Client,
            service_name,
            request_support.type_name(),
            request_support.type_hash(),
            qos,
        )?;
        let data = ClientData::new(
            &self.session,
            Arc::clone(&self.graph),
            Arc::clone(&self.pool),
            entity,
            request_support,
            response_support,
        )?;
        self.entities.lock().clients.insert(id, Arc::clone(&data));
        Ok(data)
    }

    /// Look up an entity by the integer id embedded in its descriptor.
    #[must_use]
    pub fn get_publisher(&self, id: u64) -> Option<Arc<PublisherData>> {
        self.entities.lock().publishers.get(&id).cloned()
    }

    #[must_use]
    pub fn get_subscription(&self, id: u64) -> Option<Arc<SubscriptionData>> {
        self.entities.lock().subscriptions.get(&id).cloned()
    }

    #[must_use]
    pub fn get_service(&self, id: u64) -> Option<Arc<ServiceData>> {
        self.entities.lock().services.get(&id).cloned()
    }

    #[must_use]
    pub fn get_client(&self, id: u64) -> Option<Arc<ClientData>> {
        self.entities.lock().clients.get(&id).cloned()
    }

    /// Shut down and remove one publisher.
    pub fn delete_publisher(&self, id: u64) -> Result<()> {
        let data = self
            .entities
            .lock()
            .publishers
            .remove(&id)
            .ok_or(Error::NotFound)?;
        data.shutdown()
    }

    pub fn delete_subscription(&self, id: u64) -> Result<()> {
        let data = self
            .entities
            .lock()
            .subscriptions
            .remove(&id)
            .ok_or(Error::NotFound)?;
        data.shutdown()
    }

    pub fn delete_service(&self, id: u64) -> Result<()> {
        let data = self
            .entities
            .lock()
            .services
            .remove(&id)
            .ok_or(Error::NotFound)?;
        data.shutdown()
    }

    pub fn delete_client(&self, id: u64) -> Result<()> {
        let data = self
            .entities
            .lock()
            .clients
            .remove(&id)
            .ok_or(Error::NotFound)?;
        data.shutdown()
    }

    /// Shut down every owned entity, then drop the node token. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Snapshot under the lock, shut down outside it.
        let entities = {
            let mut entities = self.entities.lock();
            std::mem::take(&mut *entities)
        };
        for publisher in entities.publishers.values() {
            if let Err(err) = publisher.shutdown() {
                log::error!("[node] publisher shutdown failed: {}", err);
            }
        }
        for subscription in entities.subscriptions.values() {
            if let Err(err) = subscription.shutdown() {
                log::error!("[node] subscription shutdown failed: {}", err);
            }
        }
        for service in entities.services.values() {
            if let Err(err) = service.shutdown() {
                log::error!("[node] service shutdown failed: {}", err);
            }
        }
        for client in entities.clients.values() {
            if let Err(err) = client.shutdown() {
                log::error!("[node] client shutdown failed: {}", err);
            }
        }

        self.token.lock().take();
        Ok(())
    }
}

impl Drop for NodeData {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
