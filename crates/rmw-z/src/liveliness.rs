// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity descriptors and their liveliness key expressions.
//!
//! The key expression is the sole discovery mechanism: every entity encodes
//! its full descriptor into an admin-space key and declares a liveliness
//! token on it. Peers subscribe with a wildcard and reconstruct descriptors
//! from the keys they observe.
//!
//! Grammar:
//!
//! ```text
//! @rmw_lv/<version>/<zid>/<nid>/<id>/<kind>/<domain>/<namespace>/<node_name>/<enclave>
//!     [ /<topic_name>/<type_name>/<type_hash>/<qos_token> ]
//! ```
//!
//! User-supplied names are mangled with percent escapes so `/` and the
//! fabric's reserved characters never leak into key chunks. The QoS token is
//! a fixed-width field encoding of [`QosProfile`]. Decoding is total except
//! for a version mismatch, which discards the key silently.

use crate::attachment::GID_SIZE;
use crate::fabric::KeyExpr;
use crate::qos::{Durability, History, LivelinessKind, QosProfile, Reliability};

/// Fixed admin-space marker every liveliness key starts with.
pub const ADMIN_SPACE: &str = "@rmw_lv";

/// Key layout version. Keys carrying any other version are ignored.
pub const KEYEXPR_VERSION: &str = "0";

const NODE_SEGMENTS: usize = 10;
const TOPIC_SEGMENTS: usize = 14;

/// What kind of participant an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Publisher,
    Subscription,
    Service,
    Client,
}

impl EntityKind {
    /// Two-letter token used in key expressions.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            EntityKind::Node => "NN",
            EntityKind::Publisher => "MP",
            EntityKind::Subscription => "MS",
            EntityKind::Service => "SS",
            EntityKind::Client => "SC",
        }
    }

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "NN" => Some(EntityKind::Node),
            "MP" => Some(EntityKind::Publisher),
            "MS" => Some(EntityKind::Subscription),
            "SS" => Some(EntityKind::Service),
            "SC" => Some(EntityKind::Client),
            _ => None,
        }
    }
}

/// Node-level part of an entity descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub domain_id: u32,
    pub namespace: String,
    pub node_name: String,
    pub enclave: String,
}

/// Topic-level part of an entity descriptor (absent for nodes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    pub name: String,
    pub type_name: String,
    pub type_hash: String,
    pub qos: QosProfile,
}

/// A participant in the distributed graph. `(zid, id)` is unique across the
/// graph and stable for the entity's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    zid: String,
    nid: String,
    id: String,
    kind: EntityKind,
    node_info: NodeInfo,
    topic_info: Option<TopicInfo>,
}

impl Entity {
    /// Build a descriptor. Node entities must not carry topic info and use
    /// `nid` as their `id`; topic-level entities must carry it.
    pub fn new(
        zid: impl Into<String>,
        nid: impl Into<String>,
        id: impl Into<String>,
        kind: EntityKind,
        node_info: NodeInfo,
        topic_info: Option<TopicInfo>,
    ) -> Option<Self> {
        let nid = nid.into();
        if nid.is_empty() {
            return None;
        }
        match kind {
            EntityKind::Node if topic_info.is_some() => return None,
            EntityKind::Node => {}
            _ if topic_info.is_none() => return None,
            _ => {}
        }
        Some(Self {
            zid: zid.into(),
            nid,
            id: id.into(),
            kind,
            node_info,
            topic_info,
        })
    }

    #[must_use]
    pub fn zid(&self) -> &str {
        &self.zid
    }

    #[must_use]
    pub fn nid(&self) -> &str {
        &self.nid
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn node_info(&self) -> &NodeInfo {
        &self.node_info
    }

    #[must_use]
    pub fn topic_info(&self) -> Option<&TopicInfo> {
        self.topic_info.as_ref()
    }

    /// Deterministic 16-byte GID derived from `(zid, id)`.
    #[must_use]
    pub fn source_gid(&self) -> [u8; GID_SIZE] {
        let digest = md5::compute(format!("{}/{}", self.zid, self.id));
        digest.0
    }

    /// Liveliness key expression for this entity.
    #[must_use]
    pub fn keyexpr(&self) -> KeyExpr {
        let mut key = format!(
            "{}/{}/{}/{}/{}/{}/{}/{}/{}/{}",
            ADMIN_SPACE,
            KEYEXPR_VERSION,
            self.zid,
            self.nid,
            self.id,
            self.kind.token(),
            self.node_info.domain_id,
            mangle_name(&self.node_info.namespace),
            mangle_name(&self.node_info.node_name),
            mangle_name(&self.node_info.enclave),
        );
        if let Some(topic) = &self.topic_info {
            key.push_str(&format!(
                "/{}/{}/{}/{}",
                mangle_name(&topic.name),
                mangle_name(&topic.type_name),
                mangle_name(&topic.type_hash),
                encode_qos(&topic.qos),
            ));
        }
        // The encoder never emits empty or wildcard chunks, so this is a
        // structurally valid key expression.
        KeyExpr::new(key).unwrap_or_else(|| {
            KeyExpr::new(format!("{}/{}/invalid", ADMIN_SPACE, KEYEXPR_VERSION))
                .expect("fallback key is valid")
        })
    }

    /// Data key expression for the entity's topic or service, shared by all
    /// matching endpoints: `<domain>/<topic>/<type>/<hash>`.
    #[must_use]
    pub fn topic_keyexpr(&self) -> Option<KeyExpr> {
        let topic = self.topic_info.as_ref()?;
        KeyExpr::new(format!(
            "{}/{}/{}/{}",
            self.node_info.domain_id,
            mangle_name(&topic.name),
            mangle_name(&topic.type_name),
            mangle_name(&topic.type_hash),
        ))
    }

    /// Parse a liveliness key expression back into a descriptor.
    ///
    /// Returns `None` for malformed keys and, silently, for version
    /// mismatches.
    #[must_use]
    pub fn from_keyexpr(key: &str) -> Option<Self> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() != NODE_SEGMENTS && segments.len() != TOPIC_SEGMENTS {
            return None;
        }
        if segments[0] != ADMIN_SPACE || segments[1] != KEYEXPR_VERSION {
            return None;
        }

        let kind = EntityKind::from_token(segments[5])?;
        let node_info = NodeInfo {
            domain_id: segments[6].parse().ok()?,
            namespace: demangle_name(segments[7])?,
            node_name: demangle_name(segments[8])?,
            enclave: demangle_name(segments[9])?,
        };

        let topic_info = if segments.len() == TOPIC_SEGMENTS {
            Some(TopicInfo {
                name: demangle_name(segments[10])?,
                type_name: demangle_name(segments[11])?,
                type_hash: demangle_name(segments[12])?,
                qos: decode_qos(segments[13])?,
            })
        } else {
            None
        };

        match (kind, topic_info.is_some()) {
            (EntityKind::Node, true) => return None,
            (EntityKind::Node, false) => {}
            (_, false) => return None,
            _ => {}
        }

        Entity::new(segments[2], segments[3], segments[4], kind, node_info, topic_info)
    }
}

/// Wildcard over every liveliness key of one domain.
#[must_use]
pub fn domain_keyexpr(domain_id: u32) -> KeyExpr {
    let key = format!(
        "{}/{}/*/*/*/*/{}/**",
        ADMIN_SPACE, KEYEXPR_VERSION, domain_id
    );
    KeyExpr::new(key).expect("domain wildcard is a valid key expression")
}

/// Escape `%`, `/` and the wildcard characters so a user-supplied name
/// becomes a single key chunk. The empty string maps to a lone `%`.
#[must_use]
pub fn mangle_name(name: &str) -> String {
    if name.is_empty() {
        return "%".to_string();
    }
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '*' => out.push_str("%2A"),
            '?' => out.push_str("%3F"),
            '$' => out.push_str("%24"),
            '#' => out.push_str("%23"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverse [`mangle_name`]. Returns `None` on truncated or unknown escapes.
#[must_use]
pub fn demangle_name(mangled: &str) -> Option<String> {
    if mangled == "%" {
        return Some(String::new());
    }
    let mut out = String::with_capacity(mangled.len());
    let mut chars = mangled.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let hi = chars.next()?;
        let lo = chars.next()?;
        let byte = u8::from_str_radix(&format!("{}{}", hi, lo), 16).ok()?;
        out.push(byte as char);
    }
    Some(out)
}

// QoS token: fixed-width fields, 60 characters total.
//   [0]      reliability digit
//   [1]      durability digit
//   [2]      history digit
//   [3..11]  depth, 8 hex digits
//   [11..27] deadline ns, 16 hex digits
//   [27..43] lifespan ns, 16 hex digits
//   [43]     liveliness digit
//   [44..60] liveliness lease ns, 16 hex digits
const QOS_TOKEN_LEN: usize = 60;

fn encode_qos(qos: &QosProfile) -> String {
    format!(
        "{}{}{}{:08x}{:016x}{:016x}{}{:016x}",
        qos.reliability as u8,
        qos.durability as u8,
        qos.history as u8,
        qos.depth,
        qos.deadline_ns,
        qos.lifespan_ns,
        qos.liveliness as u8,
        qos.liveliness_lease_ns,
    )
}

fn decode_qos(token: &str) -> Option<QosProfile> {
    if token.len() != QOS_TOKEN_LEN || !token.is_ascii() {
        return None;
    }
    let reliability = match &token[0..1] {
        "1" => Reliability::Reliable,
        "2" => Reliability::BestEffort,
        _ => return None,
    };
    let durability = match &token[1..2] {
        "1" => Durability::TransientLocal,
        "2" => Durability::Volatile,
        _ => return None,
    };
    let history = match &token[2..3] {
        "1" => History::KeepLast,
        "2" => History::KeepAll,
        _ => return None,
    };
    let depth = u32::from_str_radix(&token[3..11], 16).ok()?;
    let deadline_ns = u64::from_str_radix(&token[11..27], 16).ok()?;
    let lifespan_ns = u64::from_str_radix(&token[27..43], 16).ok()?;
    let liveliness = match &token[43..44] {
        "1" => LivelinessKind::Automatic,
        "3" => LivelinessKind::ManualByTopic,
        _ => return None,
    };
    let liveliness_lease_ns = u64::from_str_radix(&token[44..60], 16).ok()?;

    Some(QosProfile {
        reliability,
        durability,
        history,
        depth,
        deadline_ns,
        lifespan_ns,
        liveliness,
        liveliness_lease_ns,
    })
}
