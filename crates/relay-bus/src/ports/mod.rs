//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! The bus engine is the only driving component; everything it talks to is a
//! driven port:
//!
//! - **Directory:** who handles a message type
//! - **Transport:** envelope delivery, arrivals and acknowledgments
//! - **Codec:** typed message <-> bytes
//! - **Dispatcher:** local handler invocation
//! - **Providers:** clock and message identifiers

pub mod outbound;

pub use outbound::{
    MessageCodec, MessageDispatcher, MessageIdGenerator, PeerDirectory, TimeSource, Transport,
    TransportSink,
};
