//! # Adapters
//!
//! Ready-made implementations of the driven ports:
//!
//! - `codec`: bincode message codec with an explicit type registry
//! - `directory`: in-memory subscription table
//! - `time`: system clock and UUIDv7 identifier generator

pub mod codec;
pub mod directory;
pub mod time;

pub use codec::BincodeCodec;
pub use directory::StaticPeerDirectory;
pub use time::{SystemTimeSource, UuidMessageIdGenerator};
