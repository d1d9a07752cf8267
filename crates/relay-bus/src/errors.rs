//! # Error Types
//!
//! Errors surfaced by the bus engine and its collaborators.

use relay_types::{MessageId, MessageTypeId, PeerId};
use thiserror::Error;

/// Errors returned by the bus engine.
#[derive(Debug, Error)]
pub enum BusError {
    /// `start` was called before `configure`.
    #[error("Bus is not configured: call configure() before start()")]
    NotConfigured,

    /// `start` or `configure` was called on a running bus.
    #[error("Bus is already running")]
    AlreadyRunning,

    /// The operation requires a started bus.
    #[error("Bus is not running")]
    NotRunning,

    /// The directory resolved no peer for a command.
    #[error("Unable to find peer for specified command: {message_type}")]
    NoPeerFound { message_type: MessageTypeId },

    /// The message could not be serialized.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The transport rejected the operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The bus dropped a pending send before it resolved (e.g. on stop).
    #[error("Completion of message {message_id} was abandoned")]
    CompletionAbandoned { message_id: MessageId },
}

/// Errors from the message codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No serializer is registered for the message type.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(MessageTypeId),

    /// The message instance is not of the type it was registered under.
    #[error("Message is not an instance of {0}")]
    TypeMismatch(MessageTypeId),

    /// Serialization failed.
    #[error("Failed to serialize {message_type}: {reason}")]
    Serialization {
        message_type: MessageTypeId,
        reason: String,
    },

    /// Deserialization failed; `source` is the original cause.
    #[error("Failed to deserialize {message_type}")]
    Deserialization {
        message_type: MessageTypeId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors from the wire transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport has not been started (or was stopped).
    #[error("Transport is not started")]
    NotStarted,

    /// A target peer cannot be reached.
    #[error("Peer {0} is unreachable")]
    Unreachable(PeerId),

    /// The acknowledged message is unknown to the transport.
    #[error("No received message with id {0}")]
    UnknownMessage(MessageId),

    /// Any other I/O failure.
    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Render an error and its whole `source()` chain on one line.
pub fn render_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
