//! # Message Traits
//!
//! Every payload carried by the bus implements [`Message`]. Commands
//! (point-to-point) additionally implement [`Command`]; events (fan-out)
//! implement [`Event`].
//!
//! ```rust
//! use relay_types::{Command, Message, MessageTypeId};
//!
//! #[derive(Debug)]
//! struct PlaceOrder {
//!     quantity: u32,
//! }
//!
//! impl Message for PlaceOrder {}
//! impl Command for PlaceOrder {}
//!
//! let command = PlaceOrder { quantity: 3 };
//! let erased: &dyn Message = &command;
//! assert_eq!(erased.message_type_id(), MessageTypeId::of::<PlaceOrder>());
//! assert_eq!(erased.downcast_ref::<PlaceOrder>().map(|c| c.quantity), Some(3));
//! ```

use crate::entities::MessageTypeId;
use std::any::Any;
use std::fmt::Debug;

/// A payload that can travel on the bus.
pub trait Message: MessageObject + Debug + Send + Sync + 'static {
    /// Wire identifier of this message type.
    ///
    /// Defaults to the fully-qualified Rust type path. Override it to keep the
    /// identifier stable across crate reorganisations.
    fn type_name() -> MessageTypeId
    where
        Self: Sized,
    {
        MessageTypeId::new(std::any::type_name::<Self>())
    }
}

/// A message addressed to the single logical owner of its type.
pub trait Command: Message {}

/// A message published to every subscribed peer.
pub trait Event: Message {}

/// Object-safe view of a [`Message`], implemented for every message type.
pub trait MessageObject {
    /// Wire identifier of the concrete message type.
    fn message_type_id(&self) -> MessageTypeId;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<M: Message> MessageObject for M {
    fn message_type_id(&self) -> MessageTypeId {
        M::type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Message {
    /// Borrow the concrete message, if it is an `M`.
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// Whether the concrete message is an `M`.
    pub fn is<M: Message>(&self) -> bool {
        self.as_any().is::<M>()
    }
}
