//! Per-message context handed to handlers.

use relay_types::{MessageId, MessageTypeId, OriginatorInfo, TransportMessage};

/// What a handler knows about the message it is processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    /// Identifier of the envelope being handled.
    pub message_id: MessageId,
    /// Type of the handled message.
    pub message_type_id: MessageTypeId,
    /// Sender of the envelope.
    pub originator: OriginatorInfo,
    /// `true` when the message was dispatched without going through the
    /// transport.
    pub is_local: bool,
}

impl MessageContext {
    /// Context for `envelope`.
    pub fn from_envelope(envelope: &TransportMessage, is_local: bool) -> Self {
        Self {
            message_id: envelope.id,
            message_type_id: envelope.message_type_id.clone(),
            originator: envelope.originator.clone(),
            is_local,
        }
    }
}
