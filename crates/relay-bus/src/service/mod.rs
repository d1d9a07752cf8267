//! # Bus Engine
//!
//! The orchestrator: resolves routing for outgoing commands and events,
//! chooses local or remote delivery, tracks send completions and processes
//! inbound envelopes.
//!
//! ## Local Dispatch
//!
//! When the local peer is itself a recipient and local dispatch is enabled,
//! the message is handed straight to the local dispatcher. Otherwise the
//! local peer is treated as any remote peer and reached through the
//! transport.
//!
//! ## Acknowledgments
//!
//! Only the inbound pipeline acknowledges: once after the dispatch of a
//! decoded arrival completes, or immediately when the arrival cannot be
//! decoded.

mod core;
mod inbound;
mod outbound;
mod pending;

pub use self::core::{Bus, BusBuilder, BusState};
pub use self::pending::SendCompletion;
