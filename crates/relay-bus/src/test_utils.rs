//! Test utilities for the bus engine.
//!
//! Deterministic providers and recording collaborators. Enable with the
//! `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_bus::test_utils::CallLog;
//!
//! let log = CallLog::new();
//! log.record("dispatcher.stop");
//! log.record("transport.stop");
//! assert_eq!(log.entries(), vec!["dispatcher.stop", "transport.stop"]);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use relay_types::{MessageId, Peer, TransportMessage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::dispatch::MessageDispatch;
use crate::errors::TransportError;
use crate::ports::{MessageDispatcher, MessageIdGenerator, TimeSource, Transport, TransportSink};

/// A time source that always returns the same instant.
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    time: DateTime<Utc>,
}

impl FixedTimeSource {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }

    /// The configured instant.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

impl Default for FixedTimeSource {
    fn default() -> Self {
        // 2024-01-01T00:00:00Z
        Self::new(Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default())
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Generates message ids `1, 2, 3, ...` (as UUIDs).
#[derive(Debug)]
pub struct SequentialMessageIdGenerator {
    next: AtomicU64,
}

impl SequentialMessageIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// The id returned by the `n`-th call (1-based).
    pub fn nth(n: u64) -> MessageId {
        MessageId::from_uuid(Uuid::from_u128(u128::from(n)))
    }
}

impl Default for SequentialMessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageIdGenerator for SequentialMessageIdGenerator {
    fn next_id(&self) -> MessageId {
        Self::nth(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Shared, ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// One `Transport::send` call.
#[derive(Debug, Clone)]
pub struct SentEnvelope {
    pub envelope: TransportMessage,
    pub targets: Vec<Peer>,
}

/// Transport recording sends and acknowledgments.
///
/// Tests raise arrivals and acknowledgments by hand. Lifecycle calls are
/// recorded in the [`CallLog`] as `transport.start` and `transport.stop`.
pub struct RecordingTransport {
    endpoint: String,
    sink: Mutex<Option<Arc<dyn TransportSink>>>,
    sent: Mutex<Vec<SentEnvelope>>,
    acked: Mutex<Vec<MessageId>>,
    is_started: AtomicBool,
    call_log: CallLog,
}

impl RecordingTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_call_log(endpoint, CallLog::new())
    }

    pub fn with_call_log(endpoint: impl Into<String>, call_log: CallLog) -> Self {
        Self {
            endpoint: endpoint.into(),
            sink: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            acked: Mutex::new(Vec::new()),
            is_started: AtomicBool::new(false),
            call_log,
        }
    }

    /// Every envelope sent so far, in order.
    pub fn sent(&self) -> Vec<SentEnvelope> {
        self.sent.lock().clone()
    }

    /// Every acknowledged message id, in order.
    pub fn acked(&self) -> Vec<MessageId> {
        self.acked.lock().clone()
    }

    pub fn is_started(&self) -> bool {
        self.is_started.load(Ordering::SeqCst)
    }

    /// Deliver `envelope` to the registered sink, as if it arrived.
    pub fn raise_message_received(&self, envelope: TransportMessage) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.on_message_received(envelope);
        }
    }

    /// Notify the registered sink that `message_id` was acknowledged.
    pub fn raise_acknowledged(&self, message_id: MessageId) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.on_acknowledged(message_id);
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn inbound_endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn register_sink(&self, sink: Arc<dyn TransportSink>) {
        *self.sink.lock() = Some(sink);
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.call_log.record("transport.start");
        self.is_started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.call_log.record("transport.stop");
        self.is_started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, envelope: &TransportMessage, targets: &[Peer]) -> Result<(), TransportError> {
        if !self.is_started() {
            return Err(TransportError::NotStarted);
        }
        self.sent.lock().push(SentEnvelope {
            envelope: envelope.clone(),
            targets: targets.to_vec(),
        });
        Ok(())
    }

    fn ack(&self, message_id: &MessageId) -> Result<(), TransportError> {
        if !self.is_started() {
            return Err(TransportError::NotStarted);
        }
        self.acked.lock().push(*message_id);
        Ok(())
    }
}

/// Dispatcher recording dispatches without running any handler.
///
/// Tests drive completion through the recorded [`MessageDispatch`]es.
/// Lifecycle calls are recorded as `dispatcher.start` and `dispatcher.stop`.
#[derive(Default)]
pub struct RecordingDispatcher {
    dispatched: Mutex<Vec<Arc<MessageDispatch>>>,
    call_log: CallLog,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_call_log(call_log: CallLog) -> Self {
        Self {
            dispatched: Mutex::new(Vec::new()),
            call_log,
        }
    }

    /// Every dispatch received so far, in order.
    pub fn dispatched(&self) -> Vec<Arc<MessageDispatch>> {
        self.dispatched.lock().clone()
    }
}

#[async_trait]
impl MessageDispatcher for RecordingDispatcher {
    fn start(&self) {
        self.call_log.record("dispatcher.start");
    }

    fn dispatch(&self, dispatch: Arc<MessageDispatch>) {
        self.dispatched.lock().push(dispatch);
    }

    async fn stop(&self) {
        self.call_log.record("dispatcher.stop");
    }
}
