//! Courier Dispatch — command routing and consistency coordination.
//!
//! A [`Router`] maps each command type to the aggregate that owns it,
//! rebuilds that aggregate from its stream, asks it for a decision, appends
//! the resulting events, and, when the caller requests strong consistency,
//! waits for the strong event handlers to process those events before
//! returning.

pub mod aggregate_runtime;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod options;
pub mod router;

pub use config::DispatcherConfig;
pub use error::{DispatchError, RegistrationError};
pub use handlers::{
    ConsistencyLevel, EventHandler, HandlerContext, HandlerError, HandlerRegistration,
};
pub use identity::IdentityRoute;
pub use options::{Consistency, DispatchOptions};
pub use router::{DispatchOutcome, ExecutionResult, Router, RouterBuilder};
