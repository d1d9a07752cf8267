use parking_lot::RwLock;
use relay_types::{Peer, PeerId};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::inbound::BusTransportSink;
use super::pending::PendingSends;
use crate::adapters::{SystemTimeSource, UuidMessageIdGenerator};
use crate::config::BusConfig;
use crate::errors::BusError;
use crate::failure::MessageDumper;
use crate::ports::{
    MessageCodec, MessageDispatcher, MessageIdGenerator, PeerDirectory, TimeSource, Transport,
};

/// Lifecycle of a [`Bus`].
///
/// ```text
/// Unconfigured ──configure──→ Configured ──start──→ Started ──stop──→ Stopping ──→ Stopped
///                                 ↑                                                   │
///                                 └──────────────────── start ────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Unconfigured,
    Configured,
    Started,
    /// The dispatcher is draining; the transport is still up.
    Stopping,
    Stopped,
}

#[derive(Debug, Default)]
pub(super) struct Identity {
    pub peer_id: Option<PeerId>,
    pub environment: Option<String>,
    pub self_peer: Option<Peer>,
}

pub(super) struct BusInner {
    pub transport: Arc<dyn Transport>,
    pub directory: Arc<dyn PeerDirectory>,
    pub codec: Arc<dyn MessageCodec>,
    pub dispatcher: Arc<dyn MessageDispatcher>,
    pub time_source: Arc<dyn TimeSource>,
    pub id_generator: Arc<dyn MessageIdGenerator>,
    pub is_local_dispatch_enabled: bool,
    pub dumper: MessageDumper,
    pub identity: RwLock<Identity>,
    pub state: RwLock<BusState>,
    pub pending: Arc<PendingSends>,
    pub lifecycle: tokio::sync::Mutex<()>,
}

impl BusInner {
    pub fn state(&self) -> BusState {
        *self.state.read()
    }

    pub fn is_self(&self, peer_id: &PeerId) -> bool {
        self.identity.read().peer_id.as_ref() == Some(peer_id)
    }
}

/// The bus engine.
///
/// Routes outgoing commands and events to local handlers or remote peers,
/// tracks send completions, and processes envelopes raised by the transport.
/// Cloning is cheap; clones share the same engine.
///
/// # Example
///
/// ```rust,ignore
/// let bus = BusBuilder::new(transport, directory, codec, dispatcher)
///     .config(BusConfig::from_env())
///     .build();
/// bus.configure(PeerId::new("Abc.Peer.0"), "Prod")?;
/// bus.start().await?;
///
/// let result = timeout(Duration::from_secs(5), bus.send(PlaceOrder { quantity: 3 })?).await??;
/// bus.stop().await?;
/// ```
#[derive(Clone)]
pub struct Bus {
    pub(super) inner: Arc<BusInner>,
}

impl Bus {
    /// Start building a bus around its collaborators.
    pub fn builder(
        transport: Arc<dyn Transport>,
        directory: Arc<dyn PeerDirectory>,
        codec: Arc<dyn MessageCodec>,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> BusBuilder {
        BusBuilder::new(transport, directory, codec, dispatcher)
    }

    /// Set the identity of the local peer.
    ///
    /// May be called again while the bus is not running.
    pub fn configure(
        &self,
        peer_id: PeerId,
        environment: impl Into<String>,
    ) -> Result<(), BusError> {
        let mut state = self.inner.state.write();
        if matches!(*state, BusState::Started | BusState::Stopping) {
            return Err(BusError::AlreadyRunning);
        }

        let environment = environment.into();
        info!(peer_id = %peer_id, environment = %environment, "Bus configured");
        {
            let mut identity = self.inner.identity.write();
            identity.peer_id = Some(peer_id);
            identity.environment = Some(environment);
        }
        if *state == BusState::Unconfigured {
            *state = BusState::Configured;
        }
        Ok(())
    }

    /// Subscribe to the transport and start it.
    ///
    /// Inbound envelopes are processed from this point on.
    pub async fn start(&self) -> Result<(), BusError> {
        let _lifecycle = self.inner.lifecycle.lock().await;

        match self.state() {
            BusState::Unconfigured => return Err(BusError::NotConfigured),
            BusState::Started | BusState::Stopping => return Err(BusError::AlreadyRunning),
            BusState::Configured | BusState::Stopped => {}
        }

        let self_peer = {
            let mut identity = self.inner.identity.write();
            let peer_id = identity.peer_id.clone().ok_or(BusError::NotConfigured)?;
            let self_peer = Peer::new(peer_id, self.inner.transport.inbound_endpoint());
            identity.self_peer = Some(self_peer.clone());
            self_peer
        };

        if let Err(error) = relay_telemetry::register_metrics() {
            warn!(error = %error, "Bus metrics not registered");
        }

        self.inner.transport.register_sink(Arc::new(BusTransportSink::new(&self.inner)));
        self.inner.dispatcher.start();

        let previous = std::mem::replace(&mut *self.inner.state.write(), BusState::Started);
        if let Err(error) = self.inner.transport.start().await {
            *self.inner.state.write() = previous;
            self.inner.dispatcher.stop().await;
            warn!(peer = %self_peer, error = %error, "Transport failed to start");
            return Err(error.into());
        }

        info!(
            peer = %self_peer,
            local_dispatch = self.inner.is_local_dispatch_enabled,
            "Bus started"
        );
        Ok(())
    }

    /// Stop the local dispatcher, then the transport.
    ///
    /// Handlers completing during the dispatcher drain can still acknowledge
    /// and send through the transport. Sends still pending afterwards resolve
    /// with [`BusError::CompletionAbandoned`].
    pub async fn stop(&self) -> Result<(), BusError> {
        let _lifecycle = self.inner.lifecycle.lock().await;

        {
            let mut state = self.inner.state.write();
            if *state != BusState::Started {
                return Err(BusError::NotRunning);
            }
            *state = BusState::Stopping;
        }
        info!(peer_id = ?self.peer_id(), "Bus stopping");

        self.inner.dispatcher.stop().await;
        let transport_result = self.inner.transport.stop().await;

        let abandoned = self.inner.pending.clear();
        *self.inner.state.write() = BusState::Stopped;

        if abandoned > 0 {
            warn!(abandoned, "Pending sends abandoned on stop");
        }
        info!("Bus stopped");
        transport_result.map_err(BusError::from)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BusState {
        self.inner.state()
    }

    /// Whether the bus is started.
    pub fn is_running(&self) -> bool {
        self.state() == BusState::Started
    }

    /// Identifier of the local peer, once configured.
    pub fn peer_id(&self) -> Option<PeerId> {
        self.inner.identity.read().peer_id.clone()
    }

    /// Environment label, once configured.
    pub fn environment(&self) -> Option<String> {
        self.inner.identity.read().environment.clone()
    }

    /// The local peer (identity plus inbound endpoint), once started.
    pub fn self_peer(&self) -> Option<Peer> {
        self.inner.identity.read().self_peer.clone()
    }

    pub fn is_local_dispatch_enabled(&self) -> bool {
        self.inner.is_local_dispatch_enabled
    }

    /// Number of sends awaiting completion.
    pub fn pending_send_count(&self) -> usize {
        self.inner.pending.len()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("state", &self.state())
            .field("peer_id", &self.peer_id())
            .field("is_local_dispatch_enabled", &self.inner.is_local_dispatch_enabled)
            .finish()
    }
}

/// Builder for [`Bus`].
///
/// Defaults: [`BusConfig::default`], [`SystemTimeSource`] and
/// [`UuidMessageIdGenerator`].
pub struct BusBuilder {
    transport: Arc<dyn Transport>,
    directory: Arc<dyn PeerDirectory>,
    codec: Arc<dyn MessageCodec>,
    dispatcher: Arc<dyn MessageDispatcher>,
    config: BusConfig,
    time_source: Arc<dyn TimeSource>,
    id_generator: Arc<dyn MessageIdGenerator>,
}

impl BusBuilder {
    pub fn new(
        transport: Arc<dyn Transport>,
        directory: Arc<dyn PeerDirectory>,
        codec: Arc<dyn MessageCodec>,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> Self {
        Self {
            transport,
            directory,
            codec,
            dispatcher,
            config: BusConfig::default(),
            time_source: Arc::new(SystemTimeSource),
            id_generator: Arc::new(UuidMessageIdGenerator),
        }
    }

    #[must_use]
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock stamping failure reports and dumps.
    #[must_use]
    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Generator of outgoing message ids.
    #[must_use]
    pub fn id_generator(mut self, id_generator: Arc<dyn MessageIdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Build the bus. A configuration carrying both a peer id and an
    /// environment yields an already configured bus.
    pub fn build(self) -> Bus {
        let BusConfig {
            peer_id,
            environment,
            is_local_dispatch_enabled,
            message_dump_directory,
        } = self.config;

        let state = if peer_id.is_some() && environment.is_some() {
            BusState::Configured
        } else {
            BusState::Unconfigured
        };

        Bus {
            inner: Arc::new(BusInner {
                transport: self.transport,
                directory: self.directory,
                codec: self.codec,
                dispatcher: self.dispatcher,
                time_source: self.time_source,
                id_generator: self.id_generator,
                is_local_dispatch_enabled,
                dumper: MessageDumper::new(message_dump_directory),
                identity: RwLock::new(Identity {
                    peer_id,
                    environment,
                    self_peer: None,
                }),
                state: RwLock::new(state),
                pending: Arc::new(PendingSends::default()),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }
}
