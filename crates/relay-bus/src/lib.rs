//! # Relay Bus - Peer-to-Peer Message Bus Engine
//!
//! Node-local runtime that sends point-to-point commands and publishes
//! fan-out events to other peers, and dispatches the messages addressed to
//! the local peer.
//!
//! ## Architecture
//!
//! ```text
//!           send() / publish()
//!                  │
//!                  ▼
//!          ┌──────────────┐  resolve   ┌────────────────┐
//!          │  Bus Engine  │ ─────────→ │ Peer Directory │
//!          └──────────────┘            └────────────────┘
//!            │          │
//!  self is a │          │ remote peers
//!  recipient ▼          ▼
//!   ┌────────────┐   ┌───────────┐  arrival / ack   ┌──────────────┐
//!   │ Dispatcher │   │ Transport │ ───────────────→ │ Bus Engine   │
//!   └────────────┘   └───────────┘                  │ (inbound)    │
//!         ↑                                         └──────────────┘
//!         └────────────── decoded arrivals ──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **At most one acknowledgment** per received envelope, emitted only
//!   after its dispatch completed.
//! - **Undecodable arrivals** are acknowledged, dumped to disk and reported
//!   as a [`CustomProcessingFailed`] event.
//! - **Stop ordering:** the dispatcher is drained before the transport
//!   stops.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod failure;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types
pub use adapters::{BincodeCodec, StaticPeerDirectory, SystemTimeSource, UuidMessageIdGenerator};
pub use config::{BusConfig, ConfigError};
pub use dispatch::{
    DispatchResult, HandlerDispatcher, HandlerError, MessageContext, MessageDispatch,
    MessageHandler,
};
pub use errors::{BusError, CodecError, TransportError};
pub use failure::{CustomProcessingFailed, MessageDumper};
pub use ports::{
    MessageCodec, MessageDispatcher, MessageIdGenerator, PeerDirectory, TimeSource, Transport,
    TransportSink,
};
pub use service::{Bus, BusBuilder, BusState, SendCompletion};
