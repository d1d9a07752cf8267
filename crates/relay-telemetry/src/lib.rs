//! # Relay Telemetry
//!
//! Observability for the Relay bus.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter` and a pretty or JSON
//!   formatter
//! - **Metrics**: Prometheus counters, gauges and histograms for the bus
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_telemetry(&config).expect("Failed to init telemetry");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `relay` | Service name in logs |
//! | `RELAY_PEER_ID` | unset | Local peer identifier |
//! | `RELAY_LOG_LEVEL` | `info` | Log level filter |
//! | `RELAY_JSON_LOGS` | `false` | JSON formatted logs |
//! | `RELAY_ENVIRONMENT` | `Dev` | Environment label |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, ACKS_SENT, DESERIALIZATION_FAILURES,
    HANDLER_DURATION, HANDLER_ERRORS, LOCAL_DISPATCHES, MESSAGES_RECEIVED, MESSAGES_SENT,
    PENDING_SENDS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logger: {0}")]
    LoggerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register the bus metrics.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    // Metrics first (no global state beyond the registry)
    register_metrics()?;
    init_logging(config)
}
