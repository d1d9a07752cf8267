//! # Core Entities
//!
//! Identities used across the bus.
//!
//! ## Clusters
//!
//! - **Networking**: `PeerId`, `Peer`
//! - **Messaging**: `MessageId`, `MessageTypeId`
//! - **Outcomes**: `CommandResult`

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: NETWORKING
// =============================================================================

/// Unique identifier of a bus participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer identifier from its string form.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A network-addressable participant in the bus.
///
/// The peer describing the local node is fixed once the bus is started;
/// peers returned by the directory are read-only views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// Unique peer identifier.
    pub id: PeerId,
    /// Endpoint the transport uses to reach this peer (e.g. `tcp://host:port`).
    pub endpoint: String,
    /// Whether the directory currently considers the peer reachable.
    pub is_up: bool,
}

impl Peer {
    /// Create a reachable peer.
    pub fn new(id: PeerId, endpoint: impl Into<String>) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            is_up: true,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.endpoint)
    }
}

// =============================================================================
// CLUSTER B: MESSAGING
// =============================================================================

/// Globally unique, time-ordered message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Wrap an existing UUID.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Generate a new UUIDv7 identifier (ordered by creation time).
    #[must_use]
    pub fn next() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies the type of a message on the wire.
///
/// The value is the fully-qualified type path of the message (as reported by
/// [`std::any::type_name`]), unless the message type overrides
/// [`crate::Message::type_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageTypeId(String);

impl MessageTypeId {
    /// Create a type identifier from a fully-qualified name.
    pub fn new(full_name: impl Into<String>) -> Self {
        Self(full_name.into())
    }

    /// The type identifier of a statically known message type.
    #[must_use]
    pub fn of<M: crate::Message>() -> Self {
        M::type_name()
    }

    /// The fully-qualified name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.0
    }

    /// The last path segment, e.g. `FakeCommand` for `my_app::FakeCommand`.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

impl fmt::Display for MessageTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLUSTER C: OUTCOMES
// =============================================================================

/// Outcome of a sent command, delivered to whoever awaits the send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// `0` on success; any other value is a handler-defined failure code.
    pub error_code: i32,
    /// Human-readable failure description.
    pub error_message: Option<String>,
}

impl CommandResult {
    /// Error code used when a handler failed without a specific code.
    pub const UNKNOWN_ERROR_CODE: i32 = 1;

    /// A successful result.
    #[must_use]
    pub fn success() -> Self {
        Self {
            error_code: 0,
            error_message: None,
        }
    }

    /// A failed result.
    pub fn failure(error_code: i32, error_message: impl Into<String>) -> Self {
        Self {
            error_code,
            error_message: Some(error_message.into()),
        }
    }

    /// Whether the command was processed without error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }
}
