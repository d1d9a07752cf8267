//! Cross-peer flows over an in-memory network.

pub mod network;

mod flows;

pub use network::{InMemoryNetwork, InMemoryTransport};
