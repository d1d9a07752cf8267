//! # Bincode Codec
//!
//! Serializes messages with `bincode`. Types must be registered before they
//! can cross the wire in either direction; the registry maps a
//! [`MessageTypeId`] to a pair of monomorphized functions.

use parking_lot::RwLock;
use relay_types::{Message, MessageTypeId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::CodecError;
use crate::failure::CustomProcessingFailed;
use crate::ports::MessageCodec;

type SerializeFn = fn(&dyn Message) -> Result<Vec<u8>, CodecError>;
type DeserializeFn = fn(&[u8]) -> Result<Arc<dyn Message>, CodecError>;

#[derive(Clone, Copy)]
struct Registration {
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

fn serialize_as<M>(message: &dyn Message) -> Result<Vec<u8>, CodecError>
where
    M: Message + Serialize,
{
    let typed = message
        .downcast_ref::<M>()
        .ok_or_else(|| CodecError::TypeMismatch(M::type_name()))?;
    bincode::serialize(typed).map_err(|e| CodecError::Serialization {
        message_type: M::type_name(),
        reason: e.to_string(),
    })
}

fn deserialize_as<M>(bytes: &[u8]) -> Result<Arc<dyn Message>, CodecError>
where
    M: Message + DeserializeOwned,
{
    let message: M = bincode::deserialize(bytes).map_err(|e| CodecError::Deserialization {
        message_type: M::type_name(),
        source: e,
    })?;
    Ok(Arc::new(message))
}

/// Message codec backed by `bincode`.
pub struct BincodeCodec {
    registrations: RwLock<HashMap<MessageTypeId, Registration>>,
}

impl BincodeCodec {
    /// Create a codec knowing only the bus's own messages.
    #[must_use]
    pub fn new() -> Self {
        let codec = Self {
            registrations: RwLock::new(HashMap::new()),
        };
        codec.register::<CustomProcessingFailed>();
        codec
    }

    /// Make `M` serializable by this codec. Re-registering is a no-op.
    pub fn register<M>(&self)
    where
        M: Message + Serialize + DeserializeOwned,
    {
        self.registrations.write().insert(
            M::type_name(),
            Registration {
                serialize: serialize_as::<M>,
                deserialize: deserialize_as::<M>,
            },
        );
    }

    /// Builder form of [`BincodeCodec::register`].
    #[must_use]
    pub fn with<M>(self) -> Self
    where
        M: Message + Serialize + DeserializeOwned,
    {
        self.register::<M>();
        self
    }

    /// Whether `message_type` is registered.
    #[must_use]
    pub fn is_registered(&self, message_type: &MessageTypeId) -> bool {
        self.registrations.read().contains_key(message_type)
    }

    fn registration(&self, message_type: &MessageTypeId) -> Result<Registration, CodecError> {
        self.registrations
            .read()
            .get(message_type)
            .copied()
            .ok_or_else(|| CodecError::UnknownMessageType(message_type.clone()))
    }
}

impl Default for BincodeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCodec for BincodeCodec {
    fn serialize(&self, message: &dyn Message) -> Result<Vec<u8>, CodecError> {
        let registration = self.registration(&message.message_type_id())?;
        (registration.serialize)(message)
    }

    fn deserialize(
        &self,
        message_type: &MessageTypeId,
        bytes: &[u8],
    ) -> Result<Arc<dyn Message>, CodecError> {
        let registration = self.registration(message_type)?;
        (registration.deserialize)(bytes)
    }
}
