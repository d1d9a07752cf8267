//! Pending-completion table for outstanding sends.
//!
//! One entry per `send`, keyed by the envelope's message id. An entry is
//! resolved by an acknowledgment from the transport or by the completion of
//! a local dispatch, and removed as it resolves.

use parking_lot::Mutex;
use relay_telemetry::PENDING_SENDS;
use relay_types::{CommandResult, MessageId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::warn;

use crate::errors::BusError;

/// Concurrent map of outstanding sends.
#[derive(Default)]
pub(crate) struct PendingSends {
    entries: Mutex<HashMap<MessageId, oneshot::Sender<CommandResult>>>,
}

impl PendingSends {
    /// Register a completion for `message_id`.
    pub fn register(&self, message_id: MessageId) -> SendCompletion {
        let (sender, receiver) = oneshot::channel();
        let replaced = self.entries.lock().insert(message_id, sender);
        if replaced.is_some() {
            // The previous awaiter observes CompletionAbandoned
            warn!(message_id = %message_id, "Pending send registered twice");
        } else {
            PENDING_SENDS.inc();
        }
        SendCompletion {
            message_id,
            receiver,
        }
    }

    /// Resolve and remove the entry of `message_id`. Returns `false` when no
    /// entry exists.
    pub fn resolve(&self, message_id: MessageId, result: CommandResult) -> bool {
        let Some(sender) = self.entries.lock().remove(&message_id) else {
            return false;
        };
        PENDING_SENDS.dec();
        // The caller may have dropped its completion already
        let _ = sender.send(result);
        true
    }

    /// Drop the entry of `message_id` without resolving it.
    pub fn remove(&self, message_id: &MessageId) {
        if self.entries.lock().remove(message_id).is_some() {
            PENDING_SENDS.dec();
        }
    }

    /// Drop every entry; their awaiters observe `CompletionAbandoned`.
    pub fn clear(&self) -> usize {
        let count = {
            let mut entries = self.entries.lock();
            let count = entries.len();
            entries.clear();
            count
        };
        PENDING_SENDS.sub(count as i64);
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Awaitable outcome of a `send`.
///
/// The bus applies no timeout: wrap the completion in
/// `tokio::time::timeout` to bound the wait.
#[derive(Debug)]
#[must_use = "a send completion does nothing unless awaited"]
pub struct SendCompletion {
    message_id: MessageId,
    receiver: oneshot::Receiver<CommandResult>,
}

impl SendCompletion {
    /// Identifier of the sent envelope.
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }
}

impl Future for SendCompletion {
    type Output = Result<CommandResult, BusError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let message_id = this.message_id;
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| BusError::CompletionAbandoned { message_id }))
    }
}
