//! Per-event context handed to handlers.

use std::sync::Weak;

use courier_core::command::Command;
use courier_core::repository::StoredEvent;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::options::DispatchOptions;
use crate::router::{DispatchOutcome, Router, RouterInner};

/// What a handler knows about the event it is processing, plus a way back
/// into the router for follow-up commands.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    router: Weak<RouterInner>,
    handler_name: String,
    event_id: Uuid,
    correlation_id: Uuid,
}

impl HandlerContext {
    pub(crate) fn new(router: Weak<RouterInner>, handler_name: &str, event: &StoredEvent) -> Self {
        Self {
            router,
            handler_name: handler_name.to_owned(),
            event_id: event.event_id,
            correlation_id: event.correlation_id,
        }
    }

    /// Name of the handler processing the event.
    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    /// Dispatches a follow-up command.
    ///
    /// Unless `options` say otherwise, the new events share the triggering
    /// event's correlation ID and name that event as their cause. A strong
    /// dispatch here holds back this handler's acknowledgement until it
    /// resolves.
    ///
    /// # Errors
    ///
    /// Returns any `DispatchError` the router produces, or
    /// `DispatchError::RouterShutdown` once the router is gone.
    pub async fn dispatch<C: Command>(
        &self,
        command: C,
        options: DispatchOptions,
    ) -> Result<DispatchOutcome, DispatchError> {
        let router = self
            .router
            .upgrade()
            .map(Router::from_inner)
            .ok_or(DispatchError::RouterShutdown)?;

        let options = DispatchOptions {
            correlation_id: options.correlation_id.or(Some(self.correlation_id)),
            causation_id: options.causation_id.or(Some(self.event_id)),
            ..options
        };

        router.dispatch(command, options).await
    }
}
