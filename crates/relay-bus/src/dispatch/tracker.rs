//! # Message Dispatch Tracker
//!
//! One message's journey through local handling, whatever its source
//! (network arrival, local short-circuit, or direct creation).
//!
//! ## State Machine
//!
//! ```text
//! Created ──set_handler_count(n)──→ HandlerCountSet ──n × set_handled──→ Completed
//!    │                                                                      ↑
//!    └──────────────────── set_handler_count(0) ────────────────────────────┘
//! ```
//!
//! Completion fires the continuation registered at creation exactly once.
//! Handler errors are collected into the [`DispatchResult`]; they never stop
//! the remaining handlers from being counted.

use parking_lot::Mutex;
use relay_types::{CommandResult, Message, MessageTypeId, TransportMessage};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::context::MessageContext;

type Continuation = Box<dyn FnOnce(DispatchResult) + Send>;

/// A failure reported by one local handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// Name of the failing handler, when the dispatcher knows it.
    pub handler: Option<String>,
    /// Rendered error, including its causes.
    pub message: String,
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handler {
            Some(handler) => write!(f, "{handler}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of a completed dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    /// Errors raised by individual handlers, in completion order.
    pub errors: Vec<HandlerError>,
}

impl DispatchResult {
    /// Whether every handler succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// The command result a sender observes for this dispatch.
    #[must_use]
    pub fn to_command_result(&self) -> CommandResult {
        if self.is_success() {
            return CommandResult::success();
        }
        let message = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        CommandResult::failure(CommandResult::UNKNOWN_ERROR_CODE, message)
    }
}

struct DispatchState {
    expected_handlers: Option<usize>,
    handled: usize,
    errors: Vec<HandlerError>,
    result: Option<DispatchResult>,
    continuation: Option<Continuation>,
}

/// In-process record of one message's local-handler completion state.
pub struct MessageDispatch {
    message: Option<Arc<dyn Message>>,
    envelope: TransportMessage,
    context: MessageContext,
    state: Mutex<DispatchState>,
}

impl MessageDispatch {
    /// Create a dispatch for `envelope`.
    ///
    /// `message` is `None` when the payload could not be deserialized.
    pub fn new(
        message: Option<Arc<dyn Message>>,
        envelope: TransportMessage,
        is_local: bool,
    ) -> Self {
        let context = MessageContext::from_envelope(&envelope, is_local);
        Self {
            message,
            envelope,
            context,
            state: Mutex::new(DispatchState {
                expected_handlers: None,
                handled: 0,
                errors: Vec::new(),
                result: None,
                continuation: None,
            }),
        }
    }

    /// Register the callback run once the dispatch completes.
    #[must_use]
    pub fn with_continuation(self, continuation: impl FnOnce(DispatchResult) + Send + 'static) -> Self {
        self.state.lock().continuation = Some(Box::new(continuation));
        self
    }

    /// The deserialized message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&Arc<dyn Message>> {
        self.message.as_ref()
    }

    /// The originating envelope.
    #[must_use]
    pub fn envelope(&self) -> &TransportMessage {
        &self.envelope
    }

    /// Type of the dispatched message.
    #[must_use]
    pub fn message_type_id(&self) -> &MessageTypeId {
        &self.envelope.message_type_id
    }

    /// Context handed to handlers.
    #[must_use]
    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    /// Whether the message was routed locally without the transport.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.context.is_local
    }

    /// Number of handlers announced by the dispatcher, once set.
    #[must_use]
    pub fn handler_count(&self) -> Option<usize> {
        self.state.lock().expected_handlers
    }

    /// Whether every expected handler has reported.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.lock().result.is_some()
    }

    /// The dispatch outcome, once completed.
    #[must_use]
    pub fn result(&self) -> Option<DispatchResult> {
        self.state.lock().result.clone()
    }

    /// Record how many local handlers will run. `0` completes immediately.
    pub fn set_handler_count(&self, handler_count: usize) {
        let completion = {
            let mut state = self.state.lock();
            if state.expected_handlers.is_some() {
                warn!(
                    message_id = %self.envelope.id,
                    handler_count,
                    "Handler count set twice, ignoring"
                );
                return;
            }
            state.expected_handlers = Some(handler_count);
            Self::try_complete(&mut state)
        };
        self.run_continuation(completion);
    }

    /// Record the completion of one handler, with its error if it failed.
    pub fn set_handled(&self, handler: Option<&str>, error: Option<anyhow::Error>) {
        let completion = {
            let mut state = self.state.lock();
            if state.result.is_some() {
                debug!(
                    message_id = %self.envelope.id,
                    "Handler completion after dispatch completed, ignoring"
                );
                return;
            }
            state.handled += 1;
            if let Some(error) = error {
                state.errors.push(HandlerError {
                    handler: handler.map(str::to_string),
                    message: format!("{error:#}"),
                });
            }
            Self::try_complete(&mut state)
        };
        self.run_continuation(completion);
    }

    fn try_complete(state: &mut DispatchState) -> Option<(Option<Continuation>, DispatchResult)> {
        let expected = state.expected_handlers?;
        if state.result.is_some() || state.handled < expected {
            return None;
        }
        let result = DispatchResult {
            errors: std::mem::take(&mut state.errors),
        };
        state.result = Some(result.clone());
        Some((state.continuation.take(), result))
    }

    // Runs outside the state lock: continuations may call back into the bus.
    fn run_continuation(&self, completion: Option<(Option<Continuation>, DispatchResult)>) {
        if let Some((Some(continuation), result)) = completion {
            continuation(result);
        }
    }
}

impl fmt::Debug for MessageDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDispatch")
            .field("message_id", &self.envelope.id)
            .field("message_type", &self.envelope.message_type_id)
            .field("is_local", &self.context.is_local)
            .field("is_completed", &self.is_completed())
            .finish()
    }
}
