//! Inbound pipeline: arrivals and acknowledgments raised by the transport.
//!
//! A decoded arrival is dispatched to local handlers and acknowledged once
//! the dispatch completes. An arrival that cannot be decoded is acknowledged
//! immediately, dumped to disk and reported through a
//! [`CustomProcessingFailed`] event.

use relay_telemetry::{ACKS_SENT, DESERIALIZATION_FAILURES, MESSAGES_RECEIVED};
use relay_types::{CommandResult, MessageId, TransportMessage};
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

use super::core::{Bus, BusInner, BusState};
use crate::dispatch::MessageDispatch;
use crate::errors::{render_error_chain, CodecError};
use crate::failure::CustomProcessingFailed;
use crate::ports::TransportSink;

/// Sink registered on the transport at start.
///
/// Holds the engine weakly so the transport does not keep it alive.
pub(super) struct BusTransportSink {
    bus: Weak<BusInner>,
}

impl BusTransportSink {
    pub fn new(bus: &Arc<BusInner>) -> Self {
        Self {
            bus: Arc::downgrade(bus),
        }
    }
}

impl TransportSink for BusTransportSink {
    fn on_message_received(&self, envelope: TransportMessage) {
        if let Some(bus) = self.bus.upgrade() {
            bus.on_message_received(envelope);
        }
    }

    fn on_acknowledged(&self, message_id: MessageId) {
        if let Some(bus) = self.bus.upgrade() {
            bus.on_acknowledged(message_id);
        }
    }
}

impl Bus {
    /// Build a dispatch for `envelope` outside the inbound pipeline.
    ///
    /// Completing the returned dispatch never acknowledges anything on the
    /// transport. An undecodable payload still goes through the failure
    /// report path and yields a dispatch without message.
    pub fn create_dispatch(&self, envelope: TransportMessage) -> MessageDispatch {
        let is_local = self.inner.is_self(envelope.sender_id());
        match self
            .inner
            .codec
            .deserialize(&envelope.message_type_id, &envelope.content)
        {
            Ok(message) => MessageDispatch::new(Some(message), envelope, is_local),
            Err(error) => {
                self.inner.handle_deserialization_error(&envelope, &error, false);
                MessageDispatch::new(None, envelope, is_local)
            }
        }
    }

    /// Hand a dispatch to the local dispatcher.
    pub fn dispatch_locally(&self, dispatch: MessageDispatch) -> Arc<MessageDispatch> {
        self.inner.dispatch_locally(dispatch)
    }
}

impl BusInner {
    fn on_message_received(&self, envelope: TransportMessage) {
        if self.state() != BusState::Started {
            warn!(
                message_id = %envelope.id,
                message_type = %envelope.message_type_id,
                "Bus not started, ignoring inbound message"
            );
            return;
        }
        MESSAGES_RECEIVED.inc();
        debug!(
            message_id = %envelope.id,
            message_type = %envelope.message_type_id,
            sender = %envelope.originator.sender_id,
            "Message received"
        );

        let message = match self
            .codec
            .deserialize(&envelope.message_type_id, &envelope.content)
        {
            Ok(message) => message,
            Err(error) => {
                self.handle_deserialization_error(&envelope, &error, true);
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let message_id = envelope.id;
        let dispatch = MessageDispatch::new(Some(message), envelope, false).with_continuation(
            move |result| {
                if !result.is_success() {
                    debug!(
                        message_id = %message_id,
                        errors = result.errors.len(),
                        "Acknowledging message despite handler errors"
                    );
                }
                match transport.ack(&message_id) {
                    Ok(()) => ACKS_SENT.inc(),
                    Err(error) => {
                        warn!(message_id = %message_id, error = %error, "Failed to acknowledge message")
                    }
                }
            },
        );
        self.dispatcher.dispatch(Arc::new(dispatch));
    }

    fn on_acknowledged(&self, message_id: MessageId) {
        if self.pending.resolve(message_id, CommandResult::success()) {
            debug!(message_id = %message_id, "Send acknowledged");
        } else {
            debug!(message_id = %message_id, "Acknowledgment for unknown message");
        }
    }

    pub(super) fn handle_deserialization_error(
        &self,
        envelope: &TransportMessage,
        error: &CodecError,
        acknowledge: bool,
    ) {
        DESERIALIZATION_FAILURES.inc();

        // The sender must not be penalized for a local decoding failure
        if acknowledge {
            match self.transport.ack(&envelope.id) {
                Ok(()) => ACKS_SENT.inc(),
                Err(ack_error) => {
                    warn!(message_id = %envelope.id, error = %ack_error, "Failed to acknowledge message")
                }
            }
        }

        let now = self.time_source.now();
        let dump_location = match self.dumper.dump(envelope, now) {
            Ok(path) => path.display().to_string(),
            Err(dump_error) => {
                error!(
                    message_id = %envelope.id,
                    directory = %self.dumper.directory().display(),
                    error = %dump_error,
                    "Unable to dump message"
                );
                format!("<dump failed: {dump_error}>")
            }
        };

        let rendered = render_error_chain(error);
        error!(
            message_id = %envelope.id,
            message_type = %envelope.message_type_id,
            dump = %dump_location,
            error = %rendered,
            "Unable to deserialize message"
        );

        let report = CustomProcessingFailed::new(
            std::any::type_name::<Bus>(),
            format!(
                "Unable to deserialize message\n\
                 MessageType: {}\n\
                 MessageId: {}\n\
                 Dumped to: {dump_location}\n\
                 Exception: {rendered}",
                envelope.message_type_id, envelope.id
            ),
            now,
        );
        if let Err(publish_error) = self.publish_message(Arc::new(report)) {
            error!(
                message_id = %envelope.id,
                error = %publish_error,
                "Unable to publish processing failure"
            );
        }
    }
}
