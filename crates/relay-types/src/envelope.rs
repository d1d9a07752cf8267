//! # `TransportMessage` Envelope
//!
//! The unit of wire transfer between peers.
//!
//! ## Properties
//!
//! - **Identity**: every envelope carries a unique, time-ordered `MessageId`.
//! - **Opaque payload**: `content` holds the codec output untouched; the
//!   envelope never interprets it.
//! - **Originator authority**: `originator.sender_id` is the sole source of
//!   truth for who sent the message.
//! - **Routing**: `target_peer_ids` is empty for published events and lists
//!   the addressees of explicitly routed commands.

use crate::entities::{MessageId, MessageTypeId, Peer, PeerId};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// Who sent an envelope, and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginatorInfo {
    /// Identifier of the sending peer.
    pub sender_id: PeerId,
    /// Endpoint of the sending peer.
    pub sender_endpoint: String,
    /// Environment label of the sending bus (e.g. `Test`, `Prod`).
    pub environment: Option<String>,
}

impl OriginatorInfo {
    /// Originator information for a local peer.
    pub fn new(sender: &Peer, environment: Option<String>) -> Self {
        Self {
            sender_id: sender.id.clone(),
            sender_endpoint: sender.endpoint.clone(),
            environment,
        }
    }
}

/// A serialized, addressed message.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Unique message identifier.
    pub id: MessageId,

    /// Type of the serialized payload.
    pub message_type_id: MessageTypeId,

    /// Serialized payload, exactly as produced by the codec.
    #[serde_as(as = "Bytes")]
    pub content: Vec<u8>,

    /// Sender of the message.
    pub originator: OriginatorInfo,

    /// Explicit addressees. Empty for broadcast-style envelopes.
    pub target_peer_ids: Vec<PeerId>,
}

impl TransportMessage {
    /// Build a broadcast-style envelope (no explicit targets).
    pub fn new(
        id: MessageId,
        message_type_id: MessageTypeId,
        content: Vec<u8>,
        originator: OriginatorInfo,
    ) -> Self {
        Self {
            id,
            message_type_id,
            content,
            originator,
            target_peer_ids: Vec::new(),
        }
    }

    /// Same envelope, explicitly addressed to `targets`.
    #[must_use]
    pub fn with_targets<'a>(mut self, targets: impl IntoIterator<Item = &'a Peer>) -> Self {
        self.target_peer_ids = targets.into_iter().map(|peer| peer.id.clone()).collect();
        self
    }

    /// Whether the envelope names explicit addressees.
    #[must_use]
    pub fn is_targeted(&self) -> bool {
        !self.target_peer_ids.is_empty()
    }

    /// Identifier of the sending peer.
    #[must_use]
    pub fn sender_id(&self) -> &PeerId {
        &self.originator.sender_id
    }
}
