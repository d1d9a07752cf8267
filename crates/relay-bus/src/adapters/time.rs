//! Production clock and identifier providers.

use chrono::{DateTime, Utc};
use relay_types::MessageId;

use crate::ports::{MessageIdGenerator, TimeSource};

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Generates UUIDv7 message identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidMessageIdGenerator;

impl MessageIdGenerator for UuidMessageIdGenerator {
    fn next_id(&self) -> MessageId {
        MessageId::next()
    }
}
