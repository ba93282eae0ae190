//! The event handler trait.

use async_trait::async_trait;
use courier_core::error::DomainError;
use courier_core::repository::StoredEvent;
use thiserror::Error;

use super::context::HandlerContext;
use crate::error::DispatchError;

/// Errors a handler may return. They are logged by the runtime and never
/// reach the dispatcher; the event simply goes unacknowledged.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A command dispatched by the handler failed.
    #[error("nested dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// The event payload could not be decoded.
    #[error("event decoding failed: {0}")]
    Decode(#[from] DomainError),

    /// Any other handler failure.
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Reacts to persisted events.
///
/// The runtime acknowledges an event to the consistency tracker only after
/// `handle` returns `Ok`, so any strong dispatch awaited inside `handle`
/// delays the acknowledgement until it resolves.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Process one event.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError` when processing fails; the event is then not
    /// acknowledged.
    async fn handle(&self, event: &StoredEvent, ctx: &HandlerContext) -> Result<(), HandlerError>;
}
