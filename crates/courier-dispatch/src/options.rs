//! Per-call dispatch options.

use std::time::Duration;

use uuid::Uuid;

/// How long, and on whom, a dispatch waits after its events are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Consistency {
    /// Return as soon as the events are appended.
    #[default]
    Eventual,
    /// Wait for every strong handler subscribed to the appended event types.
    Strong,
    /// Wait only for the named strong handlers. Names of eventual or
    /// unknown handlers are ignored.
    Handlers(Vec<String>),
}

impl Consistency {
    /// Returns `true` when the dispatch must wait on a wait record.
    #[must_use]
    pub fn waits(&self) -> bool {
        !matches!(self, Self::Eventual)
    }

    /// Returns `true` when a strong handler named `name` takes part in the wait.
    #[must_use]
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::Eventual => false,
            Self::Strong => true,
            Self::Handlers(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Options accepted by `Router::dispatch`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use courier_dispatch::{Consistency, DispatchOptions};
///
/// let options = DispatchOptions::strong()
///     .with_timeout(Duration::from_millis(250))
///     .include_execution_result();
///
/// assert_eq!(options.consistency, Consistency::Strong);
/// assert!(options.include_execution_result);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Requested consistency level.
    pub consistency: Consistency,
    /// Overrides the configured default timeout for this call.
    pub timeout: Option<Duration>,
    /// Return an `ExecutionResult` instead of a bare acknowledgement.
    pub include_execution_result: bool,
    /// Correlation ID stamped on the persisted events (generated if absent).
    pub correlation_id: Option<Uuid>,
    /// Causation ID stamped on the persisted events (defaults to the
    /// correlation ID).
    pub causation_id: Option<Uuid>,
}

impl DispatchOptions {
    /// Options requesting strong consistency.
    #[must_use]
    pub fn strong() -> Self {
        Self::default().with_consistency(Consistency::Strong)
    }

    /// Set the consistency level.
    #[must_use]
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Wait only for the named strong handlers.
    #[must_use]
    pub fn wait_for<I, S>(self, handlers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_consistency(Consistency::Handlers(
            handlers.into_iter().map(Into::into).collect(),
        ))
    }

    /// Set a per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Request an `ExecutionResult`.
    #[must_use]
    pub fn include_execution_result(mut self) -> Self {
        self.include_execution_result = true;
        self
    }

    /// Set the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Set the causation ID.
    #[must_use]
    pub fn with_causation_id(mut self, id: Uuid) -> Self {
        self.causation_id = Some(id);
        self
    }
}
