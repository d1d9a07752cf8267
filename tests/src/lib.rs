//! # Relay Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks of the engine hot paths
//! └── src/
//!     └── integration/  # Cross-peer flows
//!         ├── network.rs  # In-memory transport connecting engines
//!         └── flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p relay-tests
//!
//! # Benchmarks
//! cargo bench -p relay-tests
//! ```

pub mod integration;
