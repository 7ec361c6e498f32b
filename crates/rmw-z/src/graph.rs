// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory model of every peer's currently-live entities.
//!
//! The cache is fed exclusively by liveliness key expressions:
//! [`GraphCache::parse_put`] for token puts (and the initial seed query),
//! [`GraphCache::parse_del`] for token deletes. Both are total - malformed
//! keys are logged and ignored. Local entities additionally register their
//! events manager so the cache can raise matched / QoS-incompatible /
//! type-incompatible events when a counterpart appears or disappears.
//!
//! Structure: `zid -> nid -> node entry`, where a node entry owns four
//! id-keyed maps (publishers, subscriptions, services, clients), plus
//! topic-name and service-name indexes for lookup and matching. A
//! topic-level entry exists iff its node entry exists; nodes inferred from
//! an endpoint (seen before their own token) are non-explicit and vanish
//! with their last endpoint.

use crate::events::{EventKind, EventsManager};
use crate::liveliness::{Entity, EntityKind};
use crate::qos::check_compatibility;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Aggregate information for one topic.
#[derive(Debug, Clone)]
pub struct TopicStats {
    pub name: String,
    pub type_name: String,
    pub publisher_count: usize,
    pub subscription_count: usize,
}

struct NodeState {
    entity: Entity,
    /// True once the node's own token was seen (not just inferred from an
    /// endpoint).
    explicit: bool,
    publishers: HashMap<String, Entity>,
    subscriptions: HashMap<String, Entity>,
    services: HashMap<String, Entity>,
    clients: HashMap<String, Entity>,
}

impl NodeState {
    fn new(entity: Entity, explicit: bool) -> Self {
        Self {
            entity,
            explicit,
            publishers: HashMap::new(),
            subscriptions: HashMap::new(),
            services: HashMap::new(),
            clients: HashMap::new(),
        }
    }

    fn endpoints(&self, kind: EntityKind) -> &HashMap<String, Entity> {
        match kind {
            EntityKind::Publisher => &self.publishers,
            EntityKind::Subscription => &self.subscriptions,
            EntityKind::Service => &self.services,
            EntityKind::Client => &self.clients,
            EntityKind::Node => unreachable!("nodes have no endpoint map"),
        }
    }

    fn endpoints_mut(&mut self, kind: EntityKind) -> &mut HashMap<String, Entity> {
        match kind {
            EntityKind::Publisher => &mut self.publishers,
            EntityKind::Subscription => &mut self.subscriptions,
            EntityKind::Service => &mut self.services,
            EntityKind::Client => &mut self.clients,
            EntityKind::Node => unreachable!("nodes have no endpoint map"),
        }
    }

    fn is_empty(&self) -> bool {
        self.publishers.is_empty()
            && self.subscriptions.is_empty()
            && self.services.is_empty()
            && self.clients.is_empty()
    }
}

#[derive(Default)]
struct TopicIndex {
    publishers: Vec<Entity>,
    subscriptions: Vec<Entity>,
}

#[derive(Default)]
struct ServiceIndex {
    services: Vec<Entity>,
    clients: Vec<Entity>,
}

#[derive(Default)]
struct GraphState {
    version: u64,
    peers: HashMap<String, HashMap<String, NodeState>>,
    topics: HashMap<String, TopicIndex>,
    services: HashMap<String, ServiceIndex>,
}

/// One pending event raise, collected under the lock, fired after it.
struct EventRaise {
    events: Arc<EventsManager>,
    kind: EventKind,
    delta: i64,
    data: Option<String>,
}

/// Tracks every peer's live entities and answers graph queries.
pub struct GraphCache {
    /// Session id of the owning peer. Local entries appear like any other
    /// peer's: only once their token echoes back through the subscriber.
    own_zid: String,
    state: RwLock<GraphState>,
    /// Events managers of this peer's own endpoints, by entity id.
    locals: Mutex<HashMap<String, Arc<EventsManager>>>,
}

impl GraphCache {
    #[must_use]
    pub fn new(own_zid: impl Into<String>) -> Self {
        Self {
            own_zid: own_zid.into(),
            state: RwLock::new(GraphState::default()),
            locals: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn own_zid(&self) -> &str {
        &self.own_zid
    }

    /// Register a local endpoint's events manager so matching can raise
    /// events on it. Call before declaring the entity's liveliness token.
    pub fn register_local(&self, entity: &Entity, events: Arc<EventsManager>) {
        self.locals.lock().insert(entity.id().to_string(), events);
    }

    /// Remove a local endpoint registration (at entity shutdown).
    pub fn unregister_local(&self, id: &str) {
        self.locals.lock().remove(id);
    }

    /// Apply a liveliness put. Total: malformed keys are logged and ignored.
    pub fn parse_put(&self, keyexpr: &str, is_seed: bool) {
        let Some(entity) = Entity::from_keyexpr(keyexpr) else {
            log::warn!("[graph] ignoring malformed liveliness key {:?}", keyexpr);
            return;
        };
        log::debug!(
            "[graph] put {:?} {}/{} (seed={})",
            entity.kind(),
            entity.zid(),
            entity.id(),
            is_seed
        );

        let raises = {
            let mut guard = self.state.write();
            let state = &mut *guard;

            if entity.kind() == EntityKind::Node {
                let nodes = state.peers.entry(entity.zid().to_string()).or_default();
                match nodes.get_mut(entity.nid()) {
                    Some(node) if node.explicit => return,
                    Some(node) => {
                        node.entity = entity;
                        node.explicit = true;
                    }
                    None => {
                        nodes.insert(entity.nid().to_string(), NodeState::new(entity, true));
                    }
                }
                state.version += 1;
                Vec::new()
            } else {
                let inserted = {
                    let nodes = state.peers.entry(entity.zid().to_string()).or_default();
                    let node = nodes
                        .entry(entity.nid().to_string())
                        .or_insert_with(|| NodeState::new(node_entity_for(&entity), false));
                    let endpoints = node.endpoints_mut(entity.kind());
                    if endpoints.contains_key(entity.id()) {
                        false
                    } else {
                        endpoints.insert(entity.id().to_string(), entity.clone());
                        true
                    }
                };
                if !inserted {
                    return;
                }
                index_insert(state, &entity);
                state.version += 1;
                self.collect_match_raises(state, &entity, 1)
            }
        };

        fire(raises);
    }

    /// Apply a liveliness delete. Total like [`Self::parse_put`].
    pub fn parse_del(&self, keyexpr: &str) {
        let Some(entity) = Entity::from_keyexpr(keyexpr) else {
            log::warn!("[graph] ignoring malformed liveliness key {:?}", keyexpr);
            return;
        };
        log::debug!(
            "[graph] del {:?} {}/{}",
            entity.kind(),
            entity.zid(),
            entity.id()
        );

        let raises = {
            let mut guard = self.state.write();
            let state = &mut *guard;

            let mut raises = Vec::new();
            if entity.kind() == EntityKind::Node {
                // A node delete takes all of its endpoints with it.
                let removed: Vec<Entity> = {
                    let Some(nodes) = state.peers.get_mut(entity.zid()) else {
                        return;
                    };
                    let Some(node) = nodes.remove(entity.nid()) else {
                        return;
                    };
                    node.publishers
                        .values()
                        .chain(node.subscriptions.values())
                        .chain(node.services.values())
                        .chain(node.clients.values())
                        .cloned()
                        .collect()
                };
                prune_peer(state, entity.zid());
                for endpoint in &removed {
                    index_remove(state, endpoint);
                }
                state.version += 1;
                for endpoint in &removed {
                    raises.extend(self.collect_match_raises(state, endpoint, -1));
                }
            } else {
                let removed = {
                    let Some(nodes) = state.peers.get_mut(entity.zid()) else {
                        return;
                    };
                    let Some(node) = nodes.get_mut(entity.nid()) else {
                        return;
                    };
                    let Some(removed) = node.endpoints_mut(entity.kind()).remove(entity.id())
                    else {
                        return;
                    };
                    // Inferred nodes live only as long as their endpoints;
                    // an explicitly declared node stays until its own
                    // delete.
                    if !node.explicit && node.is_empty() {
                        nodes.remove(entity.nid());
                    }
                    removed
                };
                prune_peer(state, entity.zid());
                index_remove(state, &removed);
                state.version += 1;
                raises = self.collect_match_raises(state, &removed, -1);
            }
            raises
        };

        fire(raises);
    }

    /// Pair the given endpoint against every opposite-role endpoint on the
    /// same topic and produce the event raises for whichever sides are
    /// local. `delta` is `+1` when `entity` appeared, `-1` when it left.
    ///
    /// Each (publisher, subscription) pair is processed exactly once: when
    /// the later of the two appears, or when either leaves.
    fn collect_match_raises(
        &self,
        state: &GraphState,
        entity: &Entity,
        delta: i64,
    ) -> Vec<EventRaise> {
        let is_pub = match entity.kind() {
            EntityKind::Publisher => true,
            EntityKind::Subscription => false,
            _ => return Vec::new(),
        };
        let Some(topic) = entity.topic_info() else {
            return Vec::new();
        };
        let Some(index) = state.topics.get(&topic.name) else {
            return Vec::new();
        };
        let counterparts = if is_pub {
            &index.subscriptions
        } else {
            &index.publishers
        };

        let locals = self.locals.lock();
        let local_events = |candidate: &Entity| {
            if candidate.zid() != self.own_zid {
                return None;
            }
            locals.get(candidate.id()).map(Arc::clone)
        };

        let mut raises = Vec::new();
        for counterpart in counterparts {
            let Some(counter_topic) = counterpart.topic_info() else {
                continue;
            };

            if counter_topic.type_name != topic.type_name {
                // Type mismatch: no match counting, one-shot incompatible
                // type events on appearance only.
                if delta > 0 {
                    if let Some(events) = local_events(entity) {
                        let kind = if is_pub {
                            EventKind::PublisherIncompatibleType
                        } else {
                            EventKind::SubscriptionIncompatibleType
                        };
                        raises.push(EventRaise {
                            events,
                            kind,
                            delta: 1,
                            data: Some(counter_topic.type_name.clone()),
                        });
                    }
                    if let Some(events) = local_events(counterpart) {
                        let kind = if is_pub {
                            EventKind::SubscriptionIncompatibleType
                        } else {
                            EventKind::PublisherIncompatibleType
                        };
                        raises.push(EventRaise {
                            events,
                            kind,
                            delta: 1,
                            data: Some(topic.type_name.clone()),
                        });
                    }
                }
                continue;
            }

            let (offered, requested) = if is_pub {
                (&topic.qos, &counter_topic.qos)
            } else {
                (&counter_topic.qos, &topic.qos)
            };
            match check_compatibility(offered, requested) {
                Ok(()) => {
                    if let Some(events) = local_events(entity) {
                        let kind = if is_pub {
                            EventKind::PublicationMatched
                        } else {
                            EventKind::SubscriptionMatched
                        };
                        raises.push(EventRaise {
                            events,
                            kind,
                            delta,
                            data: None,
                        });
                    }
                    if let Some(events) = local_events(counterpart) {
                        let kind = if is_pub {
                            EventKind::SubscriptionMatched
                        } else {
                            EventKind::PublicationMatched
                        };
                        raises.push(EventRaise {
                            events,
                            kind,
                            delta,
                            data: None,
                        });
                    }
                }
                Err(policy) if delta > 0 => {
                    // Incompatible pairs never match, so they raise only on
                    // appearance and never produce unmatch deltas.
                    if let Some(events) = local_events(entity) {
                        let kind = if is_pub {
                            EventKind::OfferedQosIncompatible
                        } else {
                            EventKind::RequestedQosIncompatible
                        };
                        raises.push(EventRaise {
                            events,
                            kind,
                            delta: 1,
                            data: Some(policy.to_string()),
                        });
                    }
                    if let Some(events) = local_events(counterpart) {
                        let kind = if is_pub {
                            EventKind::RequestedQosIncompatible
                        } else {
                            EventKind::OfferedQosIncompatible
                        };
                        raises.push(EventRaise {
                            events,
                            kind,
                            delta: 1,
                            data: Some(policy.to_string()),
                        });
                    }
                }
                Err(_) => {}
            }
        }
        raises
    }

    // ---- queries ----

    /// Every node currently in the cache, explicit and inferred alike.
    #[must_use]
    pub fn nodes(&self) -> Vec<Entity> {
        let state = self.state.read();
        let mut nodes: Vec<Entity> = state
            .peers
            .values()
            .flat_map(|nodes| nodes.values().map(|node| node.entity.clone()))
            .collect();
        nodes.sort_by(|a, b| {
            let (a, b) = (a.node_info(), b.node_info());
            (&a.namespace, &a.node_name).cmp(&(&b.namespace, &b.node_name))
        });
        nodes
    }

    /// Topic names with their type and endpoint counts.
    #[must_use]
    pub fn topics(&self) -> Vec<TopicStats> {
        let state = self.state.read();
        let mut topics: Vec<TopicStats> = state
            .topics
            .iter()
            .filter(|(_, index)| !index.publishers.is_empty() || !index.subscriptions.is_empty())
            .map(|(name, index)| {
                let type_name = index
                    .publishers
                    .first()
                    .or_else(|| index.subscriptions.first())
                    .and_then(|entity| entity.topic_info())
                    .map(|topic| topic.type_name.clone())
                    .unwrap_or_default();
                TopicStats {
                    name: name.clone(),
                    type_name,
                    publisher_count: index.publishers.len(),
                    subscription_count: index.subscriptions.len(),
                }
            })
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        topics
    }

    /// Publishers currently live on `topic`.
    #[must_use]
    pub fn publishers_on(&self, topic: &str) -> Vec<Entity> {
        let state = self.state.read();
        state
            .topics
            .get(topic)
            .map(|index| index.publishers.clone())
            .unwrap_or_default()
    }

    /// Subscriptions currently live on `topic`.
    #[must_use]
    pub fn subscriptions_on(&self, topic: &str) -> Vec<Entity> {
        let state = self.state.read();
        state
            .topics
            .get(topic)
            .map(|index| index.subscriptions.clone())
            .unwrap_or_default()
    }

    /// Service endpoints offering `service`.
    #[must_use]
    pub fn services_on(&self, service: &str) -> Vec<Entity> {
        let state = self.state.read();
        state
            .services
            .get(service)
            .map(|index| index.services.clone())
            .unwrap_or_default()
    }

    /// Clients currently using `service`.
    #[must_use]
    pub fn clients_on(&self, service: &str) -> Vec<Entity> {
        let state = self.state.read();
        state
            .services
            .get(service)
            .map(|index| index.clients.clone())
            .unwrap_or_default()
    }

    /// Number of cached entities of `kind` across all peers.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        let state = self.state.read();
        state
            .peers
            .values()
            .flat_map(|nodes| nodes.values())
            .map(|node| match kind {
                EntityKind::Node => 1,
                _ => node.endpoints(kind).len(),
            })
            .sum()
    }

    /// Monotonic change counter, bumped by every effective mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }
}

/// Drop a peer entry once its last node is gone.
fn prune_peer(state: &mut GraphState, zid: &str) {
    if state.peers.get(zid).is_some_and(HashMap::is_empty) {
        state.peers.remove(zid);
    }
}

/// Synthesize the inferred node entry for an endpoint seen before its node.
fn node_entity_for(endpoint: &Entity) -> Entity {
    Entity::new(
        endpoint.zid(),
        endpoint.nid(),
        endpoint.nid(),
        EntityKind::Node,
        endpoint.node_info().clone(),
        None,
    )
    .unwrap_or_else(|| {
        unreachable!("an endpoint's node info always yields a valid node descriptor")
    })
}

fn index_insert(state: &mut GraphState, entity: &Entity) {
    let Some(topic) = entity.topic_info() else {
        return;
    };
    match entity.kind() {
        EntityKind::Publisher => state
            .topics
            .entry(topic.name.clone())
            .or_default()
            .publishers
            .push(entity.clone()),
        EntityKind::Subscription => state
            .topics
            .entry(topic.name.clone())
            .or_default()
            .subscriptions
            .push(entity.clone()),
        EntityKind::Service => state
            .services
            .entry(topic.name.clone())
            .or_default()
            .services
            .push(entity.clone()),
        EntityKind::Client => state
            .services
            .entry(topic.name.clone())
            .or_default()
            .clients
            .push(entity.clone()),
        EntityKind::Node => {}
    }
}

fn index_remove(state: &mut GraphState, entity: &Entity) {
    let Some(topic) = entity.topic_info() else {
        return;
    };
    let same = |candidate: &Entity| {
        candidate.zid() == entity.zid() && candidate.id() == entity.id()
    };
    match entity.kind() {
        EntityKind::Publisher | EntityKind::Subscription => {
            if let Some(index) = state.topics.get_mut(&topic.name) {
                index.publishers.retain(|candidate| !same(candidate));
                index.subscriptions.retain(|candidate| !same(candidate));
                if index.publishers.is_empty() && index.subscriptions.is_empty() {
                    state.topics.remove(&topic.name);
                }
            }
        }
        EntityKind::Service | EntityKind::Client => {
            if let Some(index) = state.services.get_mut(&topic.name) {
                index.services.retain(|candidate| !same(candidate));
                index.clients.retain(|candidate| !same(candidate));
                if index.services.is_empty() && index.clients.is_empty() {
                    state.services.remove(&topic.name);
                }
            }
        }
        EntityKind::Node => {}
    }
}

fn fire(raises: Vec<EventRaise>) {
    for raise in raises {
        match raise.data {
            Some(data) => raise
                .events
                .update_status_with_data(raise.kind, raise.delta, &data),
            None => raise.events.update_status(raise.kind, raise.delta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveliness::{NodeInfo, TopicInfo};
    use crate::qos::QosProfile;

    fn node_info(domain: u32, name: &str) -> NodeInfo {
        NodeInfo {
            domain_id: domain,
            namespace: "/".to_string(),
            node_name: name.to_string(),
            enclave: String::new(),
        }
    }

    fn endpoint(
        zid: &str,
        nid: &str,
        id: &str,
        kind: EntityKind,
        topic: &str,
        type_name: &str,
        qos: QosProfile,
    ) -> Entity {
        Entity::new(
            zid,
            nid,
            id,
            kind,
            node_info(0, "tester"),
            Some(TopicInfo {
                name: topic.to_string(),
                type_name: type_name.to_string(),
                type_hash: "RIHS01_t".to_string(),
                qos,
            }),
        )
        .expect("valid entity")
    }

    fn node(zid: &str, nid: &str, name: &str) -> Entity {
        Entity::new(zid, nid, nid, EntityKind::Node, node_info(0, name), None)
            .expect("valid node entity")
    }

    #[test]
    fn test_put_and_del_round_trip() {
        let cache = GraphCache::new("local");
        let remote_node = node("remote", "1", "talker");
        let remote_pub = endpoint(
            "remote",
            "1",
            "2",
            EntityKind::Publisher,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );

        cache.parse_put(remote_node.keyexpr().as_str(), false);
        cache.parse_put(remote_pub.keyexpr().as_str(), false);
        assert_eq!(cache.count(EntityKind::Node), 1);
        assert_eq!(cache.count(EntityKind::Publisher), 1);
        assert_eq!(cache.publishers_on("/chatter").len(), 1);

        cache.parse_del(remote_pub.keyexpr().as_str());
        assert_eq!(cache.count(EntityKind::Publisher), 0);
        assert!(cache.publishers_on("/chatter").is_empty());
        // The explicitly declared node survives its last endpoint.
        assert_eq!(cache.count(EntityKind::Node), 1);

        cache.parse_del(remote_node.keyexpr().as_str());
        assert_eq!(cache.count(EntityKind::Node), 0);
    }

    #[test]
    fn test_endpoint_before_node_creates_inferred_entry() {
        let cache = GraphCache::new("local");
        let remote_pub = endpoint(
            "remote",
            "1",
            "2",
            EntityKind::Publisher,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );
        cache.parse_put(remote_pub.keyexpr().as_str(), false);
        assert_eq!(cache.count(EntityKind::Node), 1, "node inferred");

        // The inferred node disappears with its last endpoint.
        cache.parse_del(remote_pub.keyexpr().as_str());
        assert_eq!(cache.count(EntityKind::Node), 0);
    }

    #[test]
    fn test_malformed_keys_are_ignored() {
        let cache = GraphCache::new("local");
        cache.parse_put("garbage", false);
        cache.parse_put("@rmw_lv/9/wrong/version/key/NN/0/a/b/c", false);
        cache.parse_del("garbage");
        assert_eq!(cache.version(), 0);
    }

    #[test]
    fn test_duplicate_put_is_a_noop() {
        let cache = GraphCache::new("local");
        let remote_pub = endpoint(
            "remote",
            "1",
            "2",
            EntityKind::Publisher,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );
        cache.parse_put(remote_pub.keyexpr().as_str(), true);
        let version = cache.version();
        cache.parse_put(remote_pub.keyexpr().as_str(), false);
        assert_eq!(cache.version(), version);
        assert_eq!(cache.publishers_on("/chatter").len(), 1);
    }

    #[test]
    fn test_local_subscription_matches_remote_publisher() {
        let cache = GraphCache::new("local");
        let events = EventsManager::new();
        let local_sub = endpoint(
            "local",
            "1",
            "2",
            EntityKind::Subscription,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );
        cache.register_local(&local_sub, Arc::clone(&events));
        cache.parse_put(local_sub.keyexpr().as_str(), false);

        let remote_pub = endpoint(
            "remote",
            "3",
            "4",
            EntityKind::Publisher,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );
        cache.parse_put(remote_pub.keyexpr().as_str(), false);

        let status = events.take_status(EventKind::SubscriptionMatched);
        assert_eq!(status.current_count, 1);
        assert_eq!(status.current_count_change, 1);
        assert_eq!(status.total_count, 1);

        // Peer drop: matched count goes back down.
        cache.parse_del(remote_pub.keyexpr().as_str());
        let status = events.take_status(EventKind::SubscriptionMatched);
        assert_eq!(status.current_count, 0);
        assert_eq!(status.current_count_change, -1);
        assert_eq!(status.total_count, 1, "totals never decrease");
    }

    #[test]
    fn test_qos_mismatch_raises_once_and_compatible_does_not_reraise() {
        let cache = GraphCache::new("local");
        let events = EventsManager::new();
        let local_sub = endpoint(
            "local",
            "1",
            "2",
            EntityKind::Subscription,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(), // reliable
        );
        cache.register_local(&local_sub, Arc::clone(&events));
        cache.parse_put(local_sub.keyexpr().as_str(), false);

        let incompatible_pub = endpoint(
            "remote",
            "3",
            "4",
            EntityKind::Publisher,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::best_effort(),
        );
        cache.parse_put(incompatible_pub.keyexpr().as_str(), false);

        let status = events.take_status(EventKind::RequestedQosIncompatible);
        assert_eq!(status.total_count, 1);
        assert_eq!(status.data, "RELIABILITY");

        // A compatible publisher appearing afterwards matches instead of
        // re-raising the incompatibility.
        let compatible_pub = endpoint(
            "remote",
            "3",
            "5",
            EntityKind::Publisher,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );
        cache.parse_put(compatible_pub.keyexpr().as_str(), false);

        let status = events.take_status(EventKind::RequestedQosIncompatible);
        assert_eq!(status.total_count, 1, "no second incompatibility");
        let matched = events.take_status(EventKind::SubscriptionMatched);
        assert_eq!(matched.current_count, 1);

        // Removing the incompatible publisher does not unmatch anything.
        cache.parse_del(incompatible_pub.keyexpr().as_str());
        let matched = events.take_status(EventKind::SubscriptionMatched);
        assert_eq!(matched.current_count, 1);
        assert_eq!(matched.current_count_change, 0);
    }

    #[test]
    fn test_type_mismatch_raises_incompatible_type_events() {
        let cache = GraphCache::new("local");
        let events = EventsManager::new();
        let local_sub = endpoint(
            "local",
            "1",
            "2",
            EntityKind::Subscription,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );
        cache.register_local(&local_sub, Arc::clone(&events));
        cache.parse_put(local_sub.keyexpr().as_str(), false);

        let other_type_pub = endpoint(
            "remote",
            "3",
            "4",
            EntityKind::Publisher,
            "/chatter",
            "std_msgs/msg/Int32",
            QosProfile::default(),
        );
        cache.parse_put(other_type_pub.keyexpr().as_str(), false);

        let status = events.take_status(EventKind::SubscriptionIncompatibleType);
        assert_eq!(status.total_count, 1);
        assert_eq!(status.data, "std_msgs/msg/Int32");
        assert_eq!(
            events.take_status(EventKind::SubscriptionMatched).total_count,
            0
        );
    }

    #[test]
    fn test_node_delete_unmatches_children() {
        let cache = GraphCache::new("local");
        let events = EventsManager::new();
        let local_sub = endpoint(
            "local",
            "1",
            "2",
            EntityKind::Subscription,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );
        cache.register_local(&local_sub, Arc::clone(&events));
        cache.parse_put(local_sub.keyexpr().as_str(), false);

        let remote_node = node("remote", "3", "talker");
        let remote_pub = endpoint(
            "remote",
            "3",
            "4",
            EntityKind::Publisher,
            "/chatter",
            "std_msgs/msg/String",
            QosProfile::default(),
        );
        cache.parse_put(remote_node.keyexpr().as_str(), false);
        cache.parse_put(remote_pub.keyexpr().as_str(), false);
        assert_eq!(
            events.take_status(EventKind::SubscriptionMatched).current_count,
            1
        );

        // Dropping the node atomically removes its endpoints and unmatches.
        cache.parse_del(remote_node.keyexpr().as_str());
        assert_eq!(cache.count(EntityKind::Publisher), 0);
        let status = events.take_status(EventKind::SubscriptionMatched);
        assert_eq!(status.current_count, 0);
        assert_eq!(status.current_count_change, -1);
    }

    #[test]
    fn test_topic_and_service_queries() {
        let cache = GraphCache::new("local");
        cache.parse_put(
            endpoint(
                "a",
                "1",
                "2",
                EntityKind::Publisher,
                "/chatter",
                "std_msgs/msg/String",
                QosProfile::default(),
            )
            .keyexpr()
            .as_str(),
            false,
        );
        cache.parse_put(
            endpoint(
                "b",
                "1",
                "2",
                EntityKind::Subscription,
                "/chatter",
                "std_msgs/msg/String",
                QosProfile::default(),
            )
            .keyexpr()
            .as_str(),
            false,
        );
        cache.parse_put(
            endpoint(
                "c",
                "1",
                "2",
                EntityKind::Service,
                "/add_two_ints",
                "example_interfaces/srv/AddTwoInts",
                QosProfile::default(),
            )
            .keyexpr()
            .as_str(),
            false,
        );

        let topics = cache.topics();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "/chatter");
        assert_eq!(topics[0].type_name, "std_msgs/msg/String");
        assert_eq!(topics[0].publisher_count, 1);
        assert_eq!(topics[0].subscription_count, 1);

        assert_eq!(cache.services_on("/add_two_ints").len(), 1);
        assert!(cache.clients_on("/add_two_ints").is_empty());
        assert_eq!(cache.nodes().len(), 3);
    }
}
