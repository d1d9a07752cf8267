//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Peer identifier of the local bus, if known
    pub peer_id: Option<String>,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to enable console output (for development)
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Environment label (Dev, Test, Prod)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "relay".to_string(),
            peer_id: None,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            environment: "Dev".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_SERVICE_NAME`: Service name (default: relay)
    /// - `RELAY_PEER_ID`: Local peer identifier (default: unset)
    /// - `RELAY_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `RELAY_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `RELAY_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `RELAY_ENVIRONMENT`: Environment label (default: Dev)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("RELAY_SERVICE_NAME").unwrap_or_else(|_| "relay".to_string()),

            peer_id: env::var("RELAY_PEER_ID").ok(),

            log_level: env::var("RELAY_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("RELAY_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("RELAY_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            environment: env::var("RELAY_ENVIRONMENT").unwrap_or_else(|_| "Dev".to_string()),
        }
    }

    /// Create configuration for a specific peer.
    pub fn for_peer(peer_id: &str) -> Self {
        let mut config = Self::from_env();
        config.peer_id = Some(peer_id.to_string());
        config
    }

    /// Get the full service name including the peer.
    pub fn full_service_name(&self) -> String {
        match &self.peer_id {
            Some(peer_id) => format!("{}-{}", self.service_name, peer_id),
            None => self.service_name.clone(),
        }
    }
}
