//! Static handler registration metadata.

use std::collections::BTreeSet;

use courier_consistency::Expectation;

use crate::aggregate_runtime::DecidedEvent;
use crate::options::Consistency;

/// Whether dispatchers may wait on a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    /// Strongly consistent dispatches wait for this handler.
    Strong,
    /// Never awaited.
    Eventual,
}

/// Name, consistency level, and subscribed event types of one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRegistration {
    name: String,
    consistency: ConsistencyLevel,
    event_types: BTreeSet<String>,
}

impl HandlerRegistration {
    /// A handler with the given name and level, subscribed to nothing yet.
    #[must_use]
    pub fn new(name: impl Into<String>, consistency: ConsistencyLevel) -> Self {
        Self {
            name: name.into(),
            consistency,
            event_types: BTreeSet::new(),
        }
    }

    /// A strongly consistent handler.
    #[must_use]
    pub fn strong(name: impl Into<String>) -> Self {
        Self::new(name, ConsistencyLevel::Strong)
    }

    /// An eventually consistent handler.
    #[must_use]
    pub fn eventual(name: impl Into<String>) -> Self {
        Self::new(name, ConsistencyLevel::Eventual)
    }

    /// Subscribe to `event_types`.
    #[must_use]
    pub fn handles<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types
            .extend(event_types.into_iter().map(Into::into));
        self
    }

    /// Unique handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consistency level.
    #[must_use]
    pub fn consistency(&self) -> ConsistencyLevel {
        self.consistency
    }

    /// Returns `true` if the handler subscribes to `event_type`.
    #[must_use]
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.event_types.contains(event_type)
    }
}

/// The immutable registration table held by the router.
#[derive(Debug, Clone, Default)]
pub(crate) struct HandlerRegistry {
    registrations: Vec<HandlerRegistration>,
}

impl HandlerRegistry {
    pub(crate) fn new(registrations: Vec<HandlerRegistration>) -> Self {
        Self { registrations }
    }

    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    /// The `(handler, version)` pairs a dispatch with `consistency` must see
    /// acknowledged, for `events` about to be appended starting at
    /// `first_version`.
    pub(crate) fn expectations(
        &self,
        consistency: &Consistency,
        first_version: u64,
        events: &[DecidedEvent],
    ) -> Vec<Expectation> {
        self.registrations
            .iter()
            .filter(|registration| {
                registration.consistency == ConsistencyLevel::Strong
                    && consistency.includes(&registration.name)
            })
            .flat_map(|registration| {
                events
                    .iter()
                    .zip(first_version..)
                    .filter(move |(event, _)| registration.subscribes_to(event.event_type))
                    .map(move |(_, version)| Expectation::new(registration.name.clone(), version))
            })
            .collect()
    }
}
