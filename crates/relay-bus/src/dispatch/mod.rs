//! # Local Dispatch
//!
//! - [`MessageDispatch`]: the dispatch tracker, one per locally handled message
//! - [`HandlerDispatcher`]: a [`MessageDispatcher`](crate::ports::MessageDispatcher)
//!   running registered async handlers on tokio tasks

mod context;
mod dispatcher;
mod tracker;

pub use context::MessageContext;
pub use dispatcher::{HandlerDispatcher, MessageHandler};
pub use tracker::{DispatchResult, HandlerError, MessageDispatch};
