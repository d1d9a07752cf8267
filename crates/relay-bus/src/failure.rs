//! # Processing Failures
//!
//! What the bus does with an envelope whose payload cannot be decoded: the
//! raw bytes are dumped to disk and a [`CustomProcessingFailed`] event is
//! published so that monitoring peers learn about the failure.

use chrono::{DateTime, Utc};
use relay_types::{Event, Message, MessageTypeId, TransportMessage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Event published when a message could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProcessingFailed {
    /// Full type name of the component that detected the failure.
    pub source_type_full_name: String,
    /// Human-readable failure description.
    pub exception_message: String,
    /// When the failure was detected.
    pub exception_utc_time: DateTime<Utc>,
}

impl CustomProcessingFailed {
    pub fn new(
        source_type_full_name: impl Into<String>,
        exception_message: impl Into<String>,
        exception_utc_time: DateTime<Utc>,
    ) -> Self {
        Self {
            source_type_full_name: source_type_full_name.into(),
            exception_message: exception_message.into(),
            exception_utc_time,
        }
    }
}

impl Message for CustomProcessingFailed {
    fn type_name() -> MessageTypeId {
        MessageTypeId::new("Relay.CustomProcessingFailed")
    }
}

impl Event for CustomProcessingFailed {}

/// Writes undecodable payloads to a dump directory.
#[derive(Debug, Clone)]
pub struct MessageDumper {
    directory: PathBuf,
}

impl MessageDumper {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory receiving the dumps.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name of the dump of `envelope` taken at `at`:
    /// `<yyyyMMdd-HH-mm-ss.ffffff>_<message type>_<message id>.bin`.
    #[must_use]
    pub fn dump_file_name(envelope: &TransportMessage, at: DateTime<Utc>) -> String {
        format!(
            "{}_{}_{}.bin",
            at.format("%Y%m%d-%H-%M-%S%.6f"),
            sanitize(envelope.message_type_id.full_name()),
            envelope.id
        )
    }

    /// Write the raw payload of `envelope`, returning the dump path.
    pub fn dump(&self, envelope: &TransportMessage, at: DateTime<Utc>) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(Self::dump_file_name(envelope, at));
        fs::write(&path, &envelope.content)?;
        Ok(path)
    }
}

fn sanitize(type_name: &str) -> String {
    type_name
        .replace("::", ".")
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' | ',' => '_',
            c => c,
        })
        .collect()
}
