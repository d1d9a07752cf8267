//! # In-Memory Network
//!
//! Connects the transports of several bus engines living in one process.
//! Envelopes and acknowledgments are delivered on spawned tokio tasks, so
//! delivery is asynchronous relative to `send`/`ack` as over a real network.
//!
//! Peers are addressed by endpoint: a transport registered under
//! `mem://a` receives every envelope targeted at a peer whose endpoint is
//! `mem://a`.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use relay_bus::{Transport, TransportError, TransportSink};
use relay_types::{MessageId, Peer, TransportMessage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Process-local network of [`InMemoryTransport`]s.
#[derive(Default)]
pub struct InMemoryNetwork {
    nodes: RwLock<HashMap<String, Arc<InMemoryTransport>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create and attach the transport listening on `endpoint`.
    pub fn transport(self: &Arc<Self>, endpoint: impl Into<String>) -> Arc<InMemoryTransport> {
        let endpoint = endpoint.into();
        let transport = Arc::new(InMemoryTransport {
            endpoint: endpoint.clone(),
            network: Arc::downgrade(self),
            sink: Mutex::new(None),
            is_started: AtomicBool::new(false),
            received_from: Mutex::new(HashMap::new()),
            sent_count: AtomicUsize::new(0),
            ack_count: AtomicUsize::new(0),
        });
        self.nodes.write().insert(endpoint, Arc::clone(&transport));
        transport
    }

    fn node(&self, endpoint: &str) -> Option<Arc<InMemoryTransport>> {
        self.nodes.read().get(endpoint).cloned()
    }
}

/// One node's view of the [`InMemoryNetwork`].
pub struct InMemoryTransport {
    endpoint: String,
    network: Weak<InMemoryNetwork>,
    sink: Mutex<Option<Arc<dyn TransportSink>>>,
    is_started: AtomicBool,
    /// Sender endpoint of every received, not yet acknowledged envelope.
    received_from: Mutex<HashMap<MessageId, String>>,
    sent_count: AtomicUsize,
    ack_count: AtomicUsize,
}

impl InMemoryTransport {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_started(&self) -> bool {
        self.is_started.load(Ordering::SeqCst)
    }

    /// Number of `send` calls accepted so far.
    pub fn sent_count(&self) -> usize {
        self.sent_count.load(Ordering::SeqCst)
    }

    /// Number of acknowledgments emitted so far.
    pub fn ack_count(&self) -> usize {
        self.ack_count.load(Ordering::SeqCst)
    }

    fn sink(&self) -> Option<Arc<dyn TransportSink>> {
        self.sink.lock().clone()
    }

    fn deliver(&self, envelope: TransportMessage) {
        self.received_from
            .lock()
            .insert(envelope.id, envelope.originator.sender_endpoint.clone());
        match self.sink() {
            Some(sink) => sink.on_message_received(envelope),
            None => warn!(endpoint = %self.endpoint, "No sink registered, envelope dropped"),
        }
    }

    fn deliver_ack(&self, message_id: MessageId) {
        if let Some(sink) = self.sink() {
            sink.on_acknowledged(message_id);
        }
    }

    fn network(&self) -> Result<Arc<InMemoryNetwork>, TransportError> {
        self.network
            .upgrade()
            .ok_or_else(|| TransportError::Io("network dropped".to_string()))
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn inbound_endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn register_sink(&self, sink: Arc<dyn TransportSink>) {
        *self.sink.lock() = Some(sink);
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.is_started.store(true, Ordering::SeqCst);
        debug!(endpoint = %self.endpoint, "In-memory transport started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.is_started.store(false, Ordering::SeqCst);
        debug!(endpoint = %self.endpoint, "In-memory transport stopped");
        Ok(())
    }

    fn send(&self, envelope: &TransportMessage, targets: &[Peer]) -> Result<(), TransportError> {
        if !self.is_started() {
            return Err(TransportError::NotStarted);
        }
        let network = self.network()?;

        let mut destinations = Vec::with_capacity(targets.len());
        for target in targets {
            match network.node(&target.endpoint) {
                Some(node) if node.is_started() => destinations.push(node),
                _ => return Err(TransportError::Unreachable(target.id.clone())),
            }
        }

        self.sent_count.fetch_add(1, Ordering::SeqCst);
        for node in destinations {
            let envelope = envelope.clone();
            tokio::spawn(async move { node.deliver(envelope) });
        }
        Ok(())
    }

    fn ack(&self, message_id: &MessageId) -> Result<(), TransportError> {
        if !self.is_started() {
            return Err(TransportError::NotStarted);
        }
        let sender_endpoint = self
            .received_from
            .lock()
            .remove(message_id)
            .ok_or(TransportError::UnknownMessage(*message_id))?;

        self.ack_count.fetch_add(1, Ordering::SeqCst);
        if let Some(node) = self.network()?.node(&sender_endpoint) {
            let message_id = *message_id;
            tokio::spawn(async move { node.deliver_ack(message_id) });
        }
        Ok(())
    }
}
