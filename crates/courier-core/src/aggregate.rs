//! Aggregate abstractions.
//!
//! An aggregate is a pure state machine: [`Aggregate::apply`] folds events
//! into state and [`Handle::execute`] turns a command into a [`Decision`].
//! Neither performs I/O; loading and persisting belong to the router.

use crate::command::Command;
use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from event history.
///
/// `Default` provides the initial state a stream is replayed onto.
pub trait Aggregate: Default + Send + Sync + 'static {
    /// Aggregate type name, used in logs and routing diagnostics.
    const AGGREGATE_TYPE: &'static str;

    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Declared failure returned when a command is rejected.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fold one event into state. Must be deterministic.
    fn apply(&mut self, event: &Self::Event);
}

/// Command handling for one command type.
///
/// An aggregate implements `Handle<C>` once per command it accepts; the
/// router's registration table pairs each command type with exactly one
/// aggregate implementation.
pub trait Handle<C: Command>: Aggregate {
    /// Decide what happens when `command` is applied to the current state.
    ///
    /// # Errors
    ///
    /// Returns the aggregate's declared error when the command is rejected.
    /// Nothing is persisted in that case.
    fn execute(&self, command: &C) -> Result<Decision<Self::Event>, Self::Error>;
}

/// Outcome of a successful command decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<E> {
    /// The command changes nothing.
    Noop,
    /// The command produces one event.
    Single(E),
    /// The command produces an ordered sequence of events.
    Many(Vec<E>),
}

impl<E> Decision<E> {
    /// Flattens the decision into the ordered events to append.
    #[must_use]
    pub fn into_events(self) -> Vec<E> {
        match self {
            Self::Noop => Vec::new(),
            Self::Single(event) => vec![event],
            Self::Many(events) => events,
        }
    }

    /// Returns `true` when nothing would be appended.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Noop => true,
            Self::Single(_) => false,
            Self::Many(events) => events.is_empty(),
        }
    }
}

impl<E> From<E> for Decision<E> {
    fn from(event: E) -> Self {
        Self::Single(event)
    }
}

impl<E> From<Vec<E>> for Decision<E> {
    fn from(events: Vec<E>) -> Self {
        Self::Many(events)
    }
}

impl<E> From<Option<E>> for Decision<E> {
    fn from(event: Option<E>) -> Self {
        event.map_or(Self::Noop, Self::Single)
    }
}
