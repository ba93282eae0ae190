//! Aggregate runtime: replay a stream into state and run a command decision.
//!
//! State is never cached between dispatches. Each dispatch folds the whole
//! stream onto `A::default()`, so the only shared mutable thing is the
//! store's per-stream version.

use std::any::Any;
use std::marker::PhantomData;

use courier_core::aggregate::{Aggregate, Decision, Handle};
use courier_core::command::Command;
use courier_core::event::DomainEvent;
use courier_core::repository::StoredEvent;
use tracing::debug;

use crate::error::DispatchError;

/// Rebuilds an aggregate from its stream.
///
/// Returns the folded state and the version of the last event seen (0 for
/// an empty stream). Events whose payload does not decode into `A::Event`
/// are skipped, leaving state unchanged.
#[must_use]
pub fn rebuild<A: Aggregate>(events: &[StoredEvent]) -> (A, u64) {
    let mut state = A::default();
    let mut version = 0;

    for stored in events {
        match stored.decode::<A::Event>() {
            Ok(event) => state.apply(&event),
            Err(err) => debug!(
                aggregate_type = A::AGGREGATE_TYPE,
                event_type = %stored.event_type,
                error = %err,
                "skipping event the aggregate does not recognize"
            ),
        }
        version = stored.stream_version;
    }

    (state, version)
}

/// Runs `command` against `state`, returning the events to append in order.
///
/// # Errors
///
/// Returns `DispatchError::AggregateExecutionFailed` carrying the
/// aggregate's own error when the command is rejected.
pub fn execute<A, C>(state: &A, command: &C) -> Result<Vec<A::Event>, DispatchError>
where
    A: Handle<C>,
    C: Command,
{
    state
        .execute(command)
        .map(Decision::into_events)
        .map_err(|err| DispatchError::AggregateExecutionFailed(Box::new(err)))
}

/// An event decided by an aggregate, serialized and ready for metadata.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DecidedEvent {
    pub event_type: &'static str,
    pub payload: serde_json::Value,
}

/// Type-erased bridge from the route table to a concrete `(A, C)` pair.
pub(crate) trait RouteExecutor: Send + Sync {
    fn aggregate_type(&self) -> &'static str;

    fn decide(
        &self,
        history: &[StoredEvent],
        command: &dyn Any,
    ) -> Result<Vec<DecidedEvent>, DispatchError>;
}

pub(crate) struct TypedExecutor<A, C> {
    _marker: PhantomData<fn() -> (A, C)>,
}

impl<A, C> TypedExecutor<A, C> {
    pub(crate) fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<A, C> RouteExecutor for TypedExecutor<A, C>
where
    A: Handle<C>,
    C: Command,
{
    fn aggregate_type(&self) -> &'static str {
        A::AGGREGATE_TYPE
    }

    fn decide(
        &self,
        history: &[StoredEvent],
        command: &dyn Any,
    ) -> Result<Vec<DecidedEvent>, DispatchError> {
        // Two command structs sharing a COMMAND_TYPE would land here.
        let command = command
            .downcast_ref::<C>()
            .ok_or_else(|| DispatchError::UnregisteredCommand(C::COMMAND_TYPE.to_owned()))?;

        let (state, _) = rebuild::<A>(history);

        execute(&state, command)?
            .iter()
            .map(|event| -> Result<DecidedEvent, DispatchError> {
                Ok(DecidedEvent {
                    event_type: event.event_type(),
                    payload: event.to_payload()?,
                })
            })
            .collect()
    }
}
