//! # Driven Ports (Outbound SPI)
//!
//! The collaborators the bus engine **requires** from the host: peer
//! directory, wire transport, message codec, local dispatcher, and the
//! identifier/clock providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_types::{Message, MessageId, MessageTypeId, Peer, TransportMessage};
use std::sync::Arc;

use crate::dispatch::MessageDispatch;
use crate::errors::{CodecError, TransportError};

/// Resolves which peers handle a message type.
///
/// # Thread Safety
///
/// Called concurrently from caller threads and transport notifications.
pub trait PeerDirectory: Send + Sync {
    /// Peers currently registered to handle `message_type`.
    ///
    /// Returns an empty list only when nobody subscribes to the type.
    fn get_peers_handling_message(&self, message_type: &MessageTypeId) -> Vec<Peer>;
}

/// Receives notifications raised by a [`Transport`].
///
/// Implemented by the bus engine and registered on start.
pub trait TransportSink: Send + Sync {
    /// An envelope addressed to the local peer arrived (possibly from itself).
    fn on_message_received(&self, envelope: TransportMessage);

    /// A remote peer acknowledged an envelope sent by the local peer.
    fn on_acknowledged(&self, message_id: MessageId);
}

/// Delivers envelopes to remote peers.
///
/// Connection management and network I/O are entirely the transport's
/// business; the engine only sees envelopes and acknowledgments.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Endpoint remote peers use to reach the local peer.
    fn inbound_endpoint(&self) -> String;

    /// Register the receiver of arrival and acknowledgment notifications,
    /// replacing any previously registered one.
    fn register_sink(&self, sink: Arc<dyn TransportSink>);

    /// Open the transport; arrivals may be raised once this returns.
    async fn start(&self) -> Result<(), TransportError>;

    /// Close the transport and tear down its connections.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Send one envelope to every peer in `targets`.
    fn send(&self, envelope: &TransportMessage, targets: &[Peer]) -> Result<(), TransportError>;

    /// Acknowledge a received envelope back to its sender.
    fn ack(&self, message_id: &MessageId) -> Result<(), TransportError>;
}

/// Converts typed messages to bytes and back.
pub trait MessageCodec: Send + Sync {
    /// Serialize a message.
    fn serialize(&self, message: &dyn Message) -> Result<Vec<u8>, CodecError>;

    /// Deserialize bytes into a message of type `message_type`.
    ///
    /// Fails with [`CodecError::Deserialization`] carrying the original cause,
    /// or [`CodecError::UnknownMessageType`].
    fn deserialize(
        &self,
        message_type: &MessageTypeId,
        bytes: &[u8],
    ) -> Result<Arc<dyn Message>, CodecError>;
}

/// Runs local handlers for a dispatch.
///
/// The dispatcher is the only mutator of a dispatch's completion state: it
/// calls [`MessageDispatch::set_handler_count`] and then
/// [`MessageDispatch::set_handled`] once per handler.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// Accept dispatches again after a stop.
    fn start(&self) {}

    /// Invoke every local handler of the dispatched message.
    fn dispatch(&self, dispatch: Arc<MessageDispatch>);

    /// Stop accepting dispatches and wait for in-flight handlers to finish.
    async fn stop(&self);
}

/// Clock used to timestamp failure reports and dumps.
///
/// Enables deterministic testing by injecting controllable time sources.
pub trait TimeSource: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Generator of envelope identifiers.
pub trait MessageIdGenerator: Send + Sync {
    /// A new, unique, time-ordered identifier.
    fn next_id(&self) -> MessageId;
}
