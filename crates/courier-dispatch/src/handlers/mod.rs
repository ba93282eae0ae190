//! Event handler runtime.
//!
//! Handlers are registered once, when the router is built, each with a name,
//! a consistency level, and the event types it subscribes to. Every handler
//! runs independently of the others; within a handler, each stream is
//! processed in version order by its own worker.

mod context;
mod handler;
mod registration;
pub(crate) mod runtime;

pub use context::HandlerContext;
pub use handler::{EventHandler, HandlerError};
pub use registration::{ConsistencyLevel, HandlerRegistration};

pub(crate) use registration::HandlerRegistry;
