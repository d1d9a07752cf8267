//! # Bus Configuration
//!
//! Per-instance settings of the bus engine. The local-dispatch switch lives
//! here rather than in process-wide state, so two engines in one process can
//! behave differently.
//!
//! # Config File Format
//!
//! ```toml
//! peer_id = "Abc.Peer.0"
//! environment = "Prod"
//! is_local_dispatch_enabled = true
//! message_dump_directory = "/var/lib/relay/message_dumps"
//! ```

use relay_types::PeerId;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    /// The configuration document is not valid TOML for this schema.
    #[error("Invalid bus configuration: {0}")]
    Parse(String),
}

/// Bus engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Identity of the local peer. When set together with `environment`, the
    /// engine is configured at construction.
    pub peer_id: Option<PeerId>,
    /// Environment label (e.g. `Dev`, `Prod`), stamped on outgoing envelopes.
    pub environment: Option<String>,
    /// Short-circuit messages addressed to the local peer instead of sending
    /// them through the transport.
    pub is_local_dispatch_enabled: bool,
    /// Where undecodable payloads are dumped.
    pub message_dump_directory: PathBuf,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            peer_id: None,
            environment: None,
            is_local_dispatch_enabled: true,
            message_dump_directory: PathBuf::from("./message_dumps"),
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_PEER_ID`: Local peer identifier (default: unset)
    /// - `RELAY_ENVIRONMENT`: Environment label (default: unset)
    /// - `RELAY_LOCAL_DISPATCH`: `false`/`0` disables local dispatch (default: true)
    /// - `RELAY_DUMP_DIR`: Message dump directory (default: ./message_dumps)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            peer_id: env::var("RELAY_PEER_ID").ok().map(PeerId::new),

            environment: env::var("RELAY_ENVIRONMENT").ok(),

            is_local_dispatch_enabled: env::var("RELAY_LOCAL_DISPATCH")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.is_local_dispatch_enabled),

            message_dump_directory: env::var("RELAY_DUMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.message_dump_directory),
        }
    }

    /// Parse configuration from a TOML document. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Set the local peer identity.
    #[must_use]
    pub fn with_identity(mut self, peer_id: PeerId, environment: impl Into<String>) -> Self {
        self.peer_id = Some(peer_id);
        self.environment = Some(environment.into());
        self
    }

    /// Enable or disable local dispatch.
    #[must_use]
    pub fn with_local_dispatch(mut self, enabled: bool) -> Self {
        self.is_local_dispatch_enabled = enabled;
        self
    }

    /// Set the message dump directory.
    #[must_use]
    pub fn with_dump_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.message_dump_directory = directory.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_local_dispatch() {
        let config = BusConfig::default();
        assert!(config.is_local_dispatch_enabled);
        assert!(config.peer_id.is_none());
        assert_eq!(config.message_dump_directory, PathBuf::from("./message_dumps"));
    }

    #[test]
    fn test_from_toml_str() {
        let config = BusConfig::from_toml_str(
            r#"
            peer_id = "Abc.Peer.0"
            environment = "Test"
            is_local_dispatch_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.peer_id, Some(PeerId::new("Abc.Peer.0")));
        assert_eq!(config.environment.as_deref(), Some("Test"));
        assert!(!config.is_local_dispatch_enabled);
        // Missing keys fall back to defaults
        assert_eq!(config.message_dump_directory, PathBuf::from("./message_dumps"));
    }

    #[test]
    fn test_from_toml_str_rejects_bad_types() {
        let result = BusConfig::from_toml_str("is_local_dispatch_enabled = \"maybe\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.toml");
        fs::write(&path, "environment = \"Prod\"\n").unwrap();

        let config = BusConfig::from_file(&path).unwrap();
        assert_eq!(config.environment.as_deref(), Some("Prod"));

        let missing = BusConfig::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_builder_methods() {
        let config = BusConfig::default()
            .with_identity(PeerId::new("Abc.Peer.1"), "Dev")
            .with_local_dispatch(false)
            .with_dump_directory("/tmp/dumps");

        assert_eq!(config.peer_id, Some(PeerId::new("Abc.Peer.1")));
        assert!(!config.is_local_dispatch_enabled);
        assert_eq!(config.message_dump_directory, PathBuf::from("/tmp/dumps"));
    }
}
