//! # Handler Dispatcher
//!
//! Runs the async handlers registered for a message type, one tokio task per
//! handler, and reports each completion into the dispatch tracker.
//!
//! ## Shutdown
//!
//! `stop()` closes the dispatcher to new dispatches and waits for every
//! in-flight handler task, so no handler runs once it returns.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use relay_telemetry::{HistogramTimer, HANDLER_DURATION, HANDLER_ERRORS};
use relay_types::{Message, MessageTypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::context::MessageContext;
use super::tracker::MessageDispatch;
use crate::ports::MessageDispatcher;

/// Handles messages of type `M`.
#[async_trait]
pub trait MessageHandler<M: Message>: Send + Sync + 'static {
    /// Process one message. Errors are reported to the dispatch tracker.
    async fn handle(&self, message: &M, context: &MessageContext) -> anyhow::Result<()>;
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, message: Arc<dyn Message>, context: MessageContext)
        -> anyhow::Result<()>;
}

struct TypedHandler<M, H> {
    name: String,
    handler: H,
    _message: PhantomData<fn(&M)>,
}

#[async_trait]
impl<M, H> ErasedHandler for TypedHandler<M, H>
where
    M: Message,
    H: MessageHandler<M>,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        message: Arc<dyn Message>,
        context: MessageContext,
    ) -> anyhow::Result<()> {
        let typed = message.downcast_ref::<M>().ok_or_else(|| {
            anyhow::anyhow!(
                "handler {} cannot process {}",
                self.name,
                message.message_type_id()
            )
        })?;
        self.handler.handle(typed, &context).await
    }
}

struct DispatcherState {
    is_running: bool,
    tasks: JoinSet<()>,
}

/// Dispatcher invoking registered [`MessageHandler`]s.
pub struct HandlerDispatcher {
    handlers: RwLock<HashMap<MessageTypeId, Vec<Arc<dyn ErasedHandler>>>>,
    state: Mutex<DispatcherState>,
    runtime: Option<Handle>,
}

impl HandlerDispatcher {
    /// Create a dispatcher with no handler.
    ///
    /// Handler tasks run on the runtime current at dispatch time, falling
    /// back to the runtime current at construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            state: Mutex::new(DispatcherState {
                is_running: true,
                tasks: JoinSet::new(),
            }),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Register `handler` for messages of type `M`.
    ///
    /// Several handlers may be registered for one type; all of them run.
    pub fn register<M, H>(&self, handler: H)
    where
        M: Message,
        H: MessageHandler<M>,
    {
        let name = std::any::type_name::<H>().to_string();
        debug!(handler = %name, message_type = %M::type_name(), "Handler registered");

        let handler: Arc<dyn ErasedHandler> = Arc::new(TypedHandler {
            name,
            handler,
            _message: PhantomData::<fn(&M)>,
        });
        self.handlers
            .write()
            .entry(M::type_name())
            .or_default()
            .push(handler);
    }

    /// Message types with at least one registered handler.
    #[must_use]
    pub fn handled_message_types(&self) -> Vec<MessageTypeId> {
        let mut types: Vec<_> = self.handlers.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of handlers registered for `message_type`.
    #[must_use]
    pub fn handler_count(&self, message_type: &MessageTypeId) -> usize {
        self.handlers.read().get(message_type).map_or(0, Vec::len)
    }

    fn handlers_for(&self, dispatch: &MessageDispatch) -> Vec<Arc<dyn ErasedHandler>> {
        if dispatch.message().is_none() {
            return Vec::new();
        }
        self.handlers
            .read()
            .get(dispatch.message_type_id())
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for HandlerDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageDispatcher for HandlerDispatcher {
    fn start(&self) {
        self.state.lock().is_running = true;
    }

    fn dispatch(&self, dispatch: Arc<MessageDispatch>) {
        let handlers = self.handlers_for(&dispatch);

        let mut state = self.state.lock();
        if !state.is_running {
            warn!(
                message_id = %dispatch.envelope().id,
                message_type = %dispatch.message_type_id(),
                "Dispatcher stopped, dispatch rejected"
            );
            return;
        }

        // Reap finished tasks so the set does not grow unbounded
        while state.tasks.try_join_next().is_some() {}

        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            drop(state);
            error!(
                message_id = %dispatch.envelope().id,
                "No tokio runtime available to run handlers"
            );
            dispatch.set_handler_count(handlers.len());
            for handler in &handlers {
                dispatch.set_handled(
                    Some(handler.name()),
                    Some(anyhow::anyhow!("no tokio runtime available")),
                );
            }
            return;
        };

        let handler_count = handlers.len();
        for handler in handlers {
            let Some(message) = dispatch.message().cloned() else {
                break;
            };
            let dispatch = Arc::clone(&dispatch);
            let context = dispatch.context().clone();
            let name = handler.name().to_string();

            let invocation = runtime.spawn(async move {
                let _timer = HistogramTimer::new(&HANDLER_DURATION);
                handler.handle(message, context).await
            });

            state.tasks.spawn_on(
                async move {
                    let error = match invocation.await {
                        Ok(Ok(())) => None,
                        Ok(Err(error)) => Some(error),
                        Err(join_error) => Some(anyhow::anyhow!("handler panicked: {join_error}")),
                    };
                    if let Some(error) = &error {
                        HANDLER_ERRORS.inc();
                        warn!(
                            handler = %name,
                            message_id = %dispatch.envelope().id,
                            error = %format!("{error:#}"),
                            "Handler failed"
                        );
                    }
                    dispatch.set_handled(Some(name.as_str()), error);
                },
                &runtime,
            );
        }
        drop(state);

        // A zero count completes inline and runs the continuation
        dispatch.set_handler_count(handler_count);
    }

    async fn stop(&self) {
        {
            self.state.lock().is_running = false;
        }

        loop {
            let mut tasks = std::mem::take(&mut self.state.lock().tasks);
            if tasks.is_empty() {
                break;
            }
            while tasks.join_next().await.is_some() {}
        }

        info!("Handler dispatcher stopped");
    }
}
