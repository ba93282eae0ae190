//! Command router.
//!
//! `dispatch` runs load → decide → append for the aggregate that owns a
//! command and, for strongly consistent calls, waits on the consistency
//! tracker. The wait record is registered before the append, using the
//! versions the append is about to assign, so an acknowledgement from a fast
//! handler can never slip in ahead of the registration. If the append fails
//! the record is dropped with its handle.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use courier_consistency::{ConsistencyTracker, Resolution};
use courier_core::aggregate::{Aggregate, Handle};
use courier_core::clock::{Clock, SystemClock};
use courier_core::command::Command;
use courier_core::error::DomainError;
use courier_core::repository::{EventRepository, NewEvent, StoredEvent};
use serde::Serialize;
use tracing::{Span, debug, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate_runtime::{RouteExecutor, TypedExecutor, rebuild};
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, RegistrationError};
use crate::handlers::runtime::HandlerRuntime;
use crate::handlers::{EventHandler, HandlerRegistration, HandlerRegistry};
use crate::identity::IdentityRoute;
use crate::options::DispatchOptions;

/// Returned when `include_execution_result` is requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// The stream identity the command was routed to (prefix included).
    pub aggregate_uuid: String,
    /// Stream version after the dispatch.
    pub aggregate_version: u64,
    /// The events persisted by this dispatch, in order.
    pub events: Vec<StoredEvent>,
}

/// Successful dispatch outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The command was handled.
    Dispatched,
    /// The command was handled and the caller asked for the details.
    Executed(ExecutionResult),
}

impl DispatchOutcome {
    /// The execution result, if one was requested.
    #[must_use]
    pub fn execution_result(&self) -> Option<&ExecutionResult> {
        match self {
            Self::Dispatched => None,
            Self::Executed(result) => Some(result),
        }
    }

    /// Consumes the outcome, returning the execution result if one was requested.
    #[must_use]
    pub fn into_execution_result(self) -> Option<ExecutionResult> {
        match self {
            Self::Dispatched => None,
            Self::Executed(result) => Some(result),
        }
    }
}

struct Route {
    identity: IdentityRoute,
    executor: Box<dyn RouteExecutor>,
}

pub(crate) struct RouterInner {
    routes: HashMap<&'static str, Route>,
    handlers: HandlerRegistry,
    repository: Arc<dyn EventRepository>,
    tracker: ConsistencyTracker,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
    _handler_runtime: HandlerRuntime,
}

/// Routes commands to aggregates and coordinates consistency waits.
///
/// Cloning is cheap; clones share routes, handlers, and the tracker.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.inner.routes.len())
            .field("handlers", &self.inner.handlers.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Starts building a router over `repository`.
    #[must_use]
    pub fn builder(repository: Arc<dyn EventRepository>) -> RouterBuilder {
        RouterBuilder::new(repository)
    }

    pub(crate) fn from_inner(inner: Arc<RouterInner>) -> Self {
        Self { inner }
    }

    /// Dispatches `command` to the aggregate that owns it.
    ///
    /// # Errors
    ///
    /// - `UnregisteredCommand` if no route exists for the command type.
    /// - `InvalidIdentity` if the identity field is missing or blank.
    /// - `AggregateExecutionFailed` if the aggregate rejects the command.
    /// - `WrongExpectedVersion` if another writer appended first.
    /// - `ConsistencyTimeout` if strong handlers miss the deadline; the
    ///   events stay persisted.
    /// - `Store` for any other event store failure.
    #[instrument(
        skip_all,
        fields(command_type = C::COMMAND_TYPE, stream_id = tracing::field::Empty)
    )]
    pub async fn dispatch<C: Command>(
        &self,
        command: C,
        options: DispatchOptions,
    ) -> Result<DispatchOutcome, DispatchError> {
        let inner = &self.inner;
        let route = inner
            .routes
            .get(C::COMMAND_TYPE)
            .ok_or_else(|| DispatchError::UnregisteredCommand(C::COMMAND_TYPE.to_owned()))?;

        let stream_id = route.identity.derive(&command)?;
        Span::current().record("stream_id", stream_id.as_str());

        let history = inner.repository.load_events(&stream_id, 0).await?;
        let expected_version = history.last().map_or(0, |event| event.stream_version);
        let decided = route.executor.decide(&history, &command)?;

        if decided.is_empty() {
            debug!(
                aggregate_type = route.executor.aggregate_type(),
                "command produced no events"
            );
            return Ok(outcome(&options, stream_id, expected_version, Vec::new()));
        }

        let wait = options.consistency.waits().then(|| {
            let expectations =
                inner
                    .handlers
                    .expectations(&options.consistency, expected_version + 1, &decided);
            inner.tracker.register(&stream_id, expectations)
        });

        let correlation_id = options.correlation_id.unwrap_or_else(Uuid::new_v4);
        let causation_id = options.causation_id.unwrap_or(correlation_id);
        let occurred_at = inner.clock.now();
        let new_events = decided
            .into_iter()
            .map(|event| NewEvent {
                event_id: Uuid::new_v4(),
                event_type: event.event_type.to_owned(),
                payload: event.payload,
                correlation_id,
                causation_id,
                occurred_at,
            })
            .collect();

        let stored = inner
            .repository
            .append_events(&stream_id, expected_version, new_events)
            .await?;
        let aggregate_version = stored
            .last()
            .map_or(expected_version, |event| event.stream_version);
        info!(
            aggregate_type = route.executor.aggregate_type(),
            count = stored.len(),
            aggregate_version,
            "events persisted"
        );

        if let Some(wait) = wait {
            let wait_id = wait.id();
            let timeout = options.timeout.unwrap_or(inner.config.default_timeout);
            match wait.wait(timeout).await {
                Resolution::Satisfied => info!(wait_id, "strong handlers caught up"),
                Resolution::TimedOut => {
                    warn!(wait_id, ?timeout, "strong handlers did not finish in time");
                    return Err(DispatchError::ConsistencyTimeout { stream_id, timeout });
                }
            }
        }

        Ok(outcome(&options, stream_id, aggregate_version, stored))
    }

    /// Rebuilds the current state of aggregate `A` from `stream_id`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Store(DomainError::AggregateNotFound)` for an
    /// empty stream, or any store failure.
    pub async fn aggregate_state<A: Aggregate>(
        &self,
        stream_id: &str,
    ) -> Result<(A, u64), DispatchError> {
        let events = self.inner.repository.load_events(stream_id, 0).await?;
        if events.is_empty() {
            return Err(DomainError::AggregateNotFound(stream_id.to_owned()).into());
        }
        Ok(rebuild::<A>(&events))
    }

    /// Number of dispatch wait records currently pending.
    #[must_use]
    pub fn pending_waits(&self) -> usize {
        self.inner.tracker.pending()
    }

    /// The configuration this router was built with.
    #[must_use]
    pub fn config(&self) -> DispatcherConfig {
        self.inner.config
    }
}

fn outcome(
    options: &DispatchOptions,
    aggregate_uuid: String,
    aggregate_version: u64,
    events: Vec<StoredEvent>,
) -> DispatchOutcome {
    if options.include_execution_result {
        DispatchOutcome::Executed(ExecutionResult {
            aggregate_uuid,
            aggregate_version,
            events,
        })
    } else {
        DispatchOutcome::Dispatched
    }
}

/// Collects routes and handlers, then starts the handler runtime.
pub struct RouterBuilder {
    repository: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
    routes: Vec<(&'static str, Route)>,
    handlers: Vec<(HandlerRegistration, Arc<dyn EventHandler>)>,
}

impl RouterBuilder {
    /// A builder with the system clock and default configuration.
    #[must_use]
    pub fn new(repository: Arc<dyn EventRepository>) -> Self {
        Self {
            repository,
            clock: Arc::new(SystemClock),
            config: DispatcherConfig::default(),
            routes: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Use `config` instead of the defaults.
    #[must_use]
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Stamp events with time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Route command `C` to aggregate `A`, deriving the stream from `identity`.
    #[must_use]
    pub fn route<C, A>(mut self, identity: IdentityRoute) -> Self
    where
        C: Command,
        A: Handle<C>,
    {
        self.routes.push((
            C::COMMAND_TYPE,
            Route {
                identity,
                executor: Box::new(TypedExecutor::<A, C>::new()),
            },
        ));
        self
    }

    /// Register an event handler.
    #[must_use]
    pub fn handler(
        mut self,
        registration: HandlerRegistration,
        handler: impl EventHandler,
    ) -> Self {
        self.handlers.push((registration, Arc::new(handler)));
        self
    }

    /// Validates the tables and starts one task per handler.
    ///
    /// # Errors
    ///
    /// - `DuplicateCommand` if a command type is routed twice.
    /// - `DuplicateHandler` if two handlers share a name.
    /// - `NoRuntime` if called outside a Tokio runtime.
    pub fn build(self) -> Result<Router, RegistrationError> {
        let Self {
            repository,
            clock,
            config,
            routes: route_list,
            handlers,
        } = self;

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| RegistrationError::NoRuntime)?;

        let mut routes = HashMap::with_capacity(route_list.len());
        for (command_type, route) in route_list {
            if routes.insert(command_type, route).is_some() {
                return Err(RegistrationError::DuplicateCommand(command_type));
            }
        }

        let mut names = HashSet::with_capacity(handlers.len());
        for (registration, _) in &handlers {
            if !names.insert(registration.name()) {
                return Err(RegistrationError::DuplicateHandler(
                    registration.name().to_owned(),
                ));
            }
        }

        let registry = HandlerRegistry::new(
            handlers
                .iter()
                .map(|(registration, _)| registration.clone())
                .collect(),
        );
        let tracker = ConsistencyTracker::new();

        info!(
            routes = routes.len(),
            handlers = registry.len(),
            default_timeout = ?config.default_timeout,
            "router built"
        );

        let inner = Arc::new_cyclic(|router| {
            let handler_runtime = HandlerRuntime::start(
                &runtime,
                handlers,
                repository.as_ref(),
                &tracker,
                router,
                config.worker_idle_timeout,
            );
            RouterInner {
                routes,
                handlers: registry,
                repository,
                tracker,
                clock,
                config,
                _handler_runtime: handler_runtime,
            }
        });

        Ok(Router { inner })
    }
}
