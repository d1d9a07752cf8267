//! Outgoing commands and events.

use relay_telemetry::{LOCAL_DISPATCHES, MESSAGES_SENT};
use relay_types::{Command, Event, Message, OriginatorInfo, Peer, TransportMessage};
use std::sync::Arc;
use tracing::{debug, warn};

use super::core::{Bus, BusInner, BusState};
use super::pending::SendCompletion;
use crate::dispatch::MessageDispatch;
use crate::errors::BusError;

impl Bus {
    /// Send a command to the peer(s) handling its type.
    ///
    /// The completion resolves once the command was handled locally, or once
    /// a remote peer acknowledged it. Fails with [`BusError::NoPeerFound`]
    /// when nobody handles the command.
    pub fn send<C: Command>(&self, command: C) -> Result<SendCompletion, BusError> {
        self.inner.send_message(Arc::new(command), None)
    }

    /// Send a command to `peer`, bypassing the directory.
    pub fn send_to<C: Command>(&self, command: C, peer: Peer) -> Result<SendCompletion, BusError> {
        self.inner.send_message(Arc::new(command), Some(peer))
    }

    /// Publish an event to every peer handling its type. Fire-and-forget.
    pub fn publish<E: Event>(&self, event: E) -> Result<(), BusError> {
        self.inner.publish_message(Arc::new(event))
    }
}

impl BusInner {
    /// The local peer and environment, if the bus accepts outgoing messages.
    ///
    /// Handlers draining during a stop may still send.
    fn sender(&self) -> Result<(Peer, Option<String>), BusError> {
        if !matches!(self.state(), BusState::Started | BusState::Stopping) {
            return Err(BusError::NotRunning);
        }
        let identity = self.identity.read();
        let self_peer = identity.self_peer.clone().ok_or(BusError::NotRunning)?;
        Ok((self_peer, identity.environment.clone()))
    }

    fn create_envelope(
        &self,
        message: &dyn Message,
        sender: &Peer,
        environment: Option<String>,
    ) -> Result<TransportMessage, BusError> {
        let content = self.codec.serialize(message)?;
        Ok(TransportMessage::new(
            self.id_generator.next_id(),
            message.message_type_id(),
            content,
            OriginatorInfo::new(sender, environment),
        ))
    }

    fn send_message(
        &self,
        message: Arc<dyn Message>,
        explicit_target: Option<Peer>,
    ) -> Result<SendCompletion, BusError> {
        let (self_peer, environment) = self.sender()?;
        let envelope = self.create_envelope(message.as_ref(), &self_peer, environment)?;

        let peers = match explicit_target {
            Some(peer) => vec![peer],
            None => self
                .directory
                .get_peers_handling_message(&envelope.message_type_id),
        };
        if peers.is_empty() {
            warn!(
                message_id = %envelope.id,
                message_type = %envelope.message_type_id,
                "No peer handles command"
            );
            return Err(BusError::NoPeerFound {
                message_type: envelope.message_type_id,
            });
        }

        let envelope = envelope.with_targets(&peers);
        let message_id = envelope.id;
        let completion = self.pending.register(message_id);
        MESSAGES_SENT.with_label_values(&["command"]).inc();

        if self.is_local_dispatch_enabled && peers.iter().any(|p| p.id == self_peer.id) {
            debug!(
                message_id = %message_id,
                message_type = %envelope.message_type_id,
                "Dispatching command locally"
            );
            let pending = Arc::clone(&self.pending);
            let dispatch = MessageDispatch::new(Some(message), envelope, true).with_continuation(
                move |result| {
                    pending.resolve(message_id, result.to_command_result());
                },
            );
            self.dispatch_locally(dispatch);
            return Ok(completion);
        }

        debug!(
            message_id = %message_id,
            message_type = %envelope.message_type_id,
            targets = ?envelope.target_peer_ids,
            "Sending command"
        );
        if let Err(error) = self.transport.send(&envelope, &peers) {
            self.pending.remove(&message_id);
            return Err(error.into());
        }
        Ok(completion)
    }

    pub(super) fn publish_message(&self, message: Arc<dyn Message>) -> Result<(), BusError> {
        let (self_peer, environment) = self.sender()?;
        let envelope = self.create_envelope(message.as_ref(), &self_peer, environment)?;

        let peers = self
            .directory
            .get_peers_handling_message(&envelope.message_type_id);
        if peers.is_empty() {
            debug!(
                message_id = %envelope.id,
                message_type = %envelope.message_type_id,
                "No peer handles event"
            );
            return Ok(());
        }
        MESSAGES_SENT.with_label_values(&["event"]).inc();

        let remote_peers: Vec<Peer> =
            if self.is_local_dispatch_enabled && peers.iter().any(|p| p.id == self_peer.id) {
                let message_id = envelope.id;
                let dispatch = MessageDispatch::new(Some(message), envelope.clone(), true)
                    .with_continuation(move |result| {
                        if !result.is_success() {
                            warn!(
                                message_id = %message_id,
                                errors = result.errors.len(),
                                "Local event handlers failed"
                            );
                        }
                    });
                self.dispatch_locally(dispatch);
                peers.into_iter().filter(|p| p.id != self_peer.id).collect()
            } else {
                peers
            };

        if remote_peers.is_empty() {
            return Ok(());
        }
        debug!(
            message_id = %envelope.id,
            message_type = %envelope.message_type_id,
            targets = remote_peers.len(),
            "Publishing event"
        );
        self.transport.send(&envelope, &remote_peers)?;
        Ok(())
    }

    pub(super) fn dispatch_locally(&self, dispatch: MessageDispatch) -> Arc<MessageDispatch> {
        LOCAL_DISPATCHES.inc();
        let dispatch = Arc::new(dispatch);
        self.dispatcher.dispatch(Arc::clone(&dispatch));
        dispatch
    }
}
