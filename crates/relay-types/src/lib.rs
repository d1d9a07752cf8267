//! # Relay Types
//!
//! The vocabulary shared by every part of the Relay bus:
//!
//! - **Peers**: `PeerId`, `Peer`
//! - **Messages**: the `Message` trait and its `Command`/`Event` markers,
//!   `MessageTypeId`, `MessageId`
//! - **Envelope**: `TransportMessage`, the unit of wire transfer
//! - **Results**: `CommandResult`, what a sent command resolves to
//!
//! ## Design Principles
//!
//! - **Immutable envelopes**: a `TransportMessage` is built once per outbound
//!   message (or per arrival) and never mutated afterwards.
//! - **Envelope identity**: the originator recorded in the envelope is the
//!   sole authority on who sent a message.

pub mod entities;
pub mod envelope;
pub mod message;

pub use entities::*;
pub use envelope::{OriginatorInfo, TransportMessage};
pub use message::{Command, Event, Message, MessageObject};
