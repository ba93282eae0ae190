//! Shared fixtures for dispatch integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::aggregate::{Aggregate, Decision, Handle};
use courier_core::command::Command;
use courier_core::event::DomainEvent;
use courier_core::repository::{EventRepository, StoredEvent};
use courier_dispatch::{
    DispatchOptions, DispatcherConfig, EventHandler, HandlerContext, HandlerError,
    HandlerRegistration, IdentityRoute, Router, RouterBuilder,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default consistency timeout for every test router.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Handler delay meaning "never finish".
pub const SLEEP_FOREVER: u64 = u64::MAX;

pub const EXECUTED: &str = "consistency.executed";
pub const DISPATCH_REQUESTED: &str = "consistency.dispatch_requested";
pub const TICKED: &str = "consistency.ticked";
pub const QUIETED: &str = "consistency.quieted";
pub const EXAMPLE_HAPPENED: &str = "example.happened";

pub const EXAMPLE_PREFIX: &str = "example-prefix-";

// ---------------------------------------------------------------------------
// Consistency aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConsistencyEvent {
    Executed { uuid: String, delay_ms: u64 },
    DispatchRequested { uuid: String, delay_ms: u64 },
    Ticked { n: u32 },
    Quieted { uuid: String },
}

impl DomainEvent for ConsistencyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Executed { .. } => EXECUTED,
            Self::DispatchRequested { .. } => DISPATCH_REQUESTED,
            Self::Ticked { .. } => TICKED,
            Self::Quieted { .. } => QUIETED,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("command rejected: {0}")]
pub struct Rejected(pub String);

#[derive(Debug, Default)]
pub struct ConsistencyAggregate {
    pub executed: u32,
    pub ticks: u32,
}

impl Aggregate for ConsistencyAggregate {
    const AGGREGATE_TYPE: &'static str = "consistency";
    type Event = ConsistencyEvent;
    type Error = Rejected;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ConsistencyEvent::Executed { .. } => self.executed += 1,
            ConsistencyEvent::Ticked { .. } => self.ticks += 1,
            ConsistencyEvent::DispatchRequested { .. } | ConsistencyEvent::Quieted { .. } => {}
        }
    }
}

/// Produces one `Executed` event; strong handlers sleep for `delay_ms`.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyCommand {
    pub uuid: String,
    pub delay_ms: u64,
}

impl ConsistencyCommand {
    pub fn new(uuid: &str, delay_ms: u64) -> Self {
        Self {
            uuid: uuid.to_owned(),
            delay_ms,
        }
    }
}

impl Command for ConsistencyCommand {
    const COMMAND_TYPE: &'static str = "consistency.execute";
}

impl Handle<ConsistencyCommand> for ConsistencyAggregate {
    fn execute(
        &self,
        command: &ConsistencyCommand,
    ) -> Result<Decision<ConsistencyEvent>, Rejected> {
        Ok(ConsistencyEvent::Executed {
            uuid: command.uuid.clone(),
            delay_ms: command.delay_ms,
        }
        .into())
    }
}

/// Produces no events.
#[derive(Debug, Clone, Serialize)]
pub struct NoOpCommand {
    pub uuid: String,
}

impl Command for NoOpCommand {
    const COMMAND_TYPE: &'static str = "consistency.noop";
}

impl Handle<NoOpCommand> for ConsistencyAggregate {
    fn execute(&self, _command: &NoOpCommand) -> Result<Decision<ConsistencyEvent>, Rejected> {
        Ok(Decision::Noop)
    }
}

/// Produces `DispatchRequested`, whose strong handler dispatches a nested
/// `ConsistencyCommand` to `"{uuid}-nested"`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDispatchCommand {
    pub uuid: String,
    pub delay_ms: u64,
}

impl Command for RequestDispatchCommand {
    const COMMAND_TYPE: &'static str = "consistency.request_dispatch";
}

impl Handle<RequestDispatchCommand> for ConsistencyAggregate {
    fn execute(
        &self,
        command: &RequestDispatchCommand,
    ) -> Result<Decision<ConsistencyEvent>, Rejected> {
        Ok(ConsistencyEvent::DispatchRequested {
            uuid: command.uuid.clone(),
            delay_ms: command.delay_ms,
        }
        .into())
    }
}

/// Always rejected by the aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct FailingCommand {
    pub uuid: String,
}

impl Command for FailingCommand {
    const COMMAND_TYPE: &'static str = "consistency.fail";
}

impl Handle<FailingCommand> for ConsistencyAggregate {
    fn execute(&self, command: &FailingCommand) -> Result<Decision<ConsistencyEvent>, Rejected> {
        Err(Rejected(command.uuid.clone()))
    }
}

/// Produces `count` `Ticked` events in one append.
#[derive(Debug, Clone, Serialize)]
pub struct MultiEventCommand {
    pub uuid: String,
    pub count: u32,
}

impl Command for MultiEventCommand {
    const COMMAND_TYPE: &'static str = "consistency.multi";
}

impl Handle<MultiEventCommand> for ConsistencyAggregate {
    fn execute(
        &self,
        command: &MultiEventCommand,
    ) -> Result<Decision<ConsistencyEvent>, Rejected> {
        let first = self.ticks;
        Ok((first..first + command.count)
            .map(|n| ConsistencyEvent::Ticked { n })
            .collect::<Vec<_>>()
            .into())
    }
}

/// Produces `Quieted`, which only an eventual handler subscribes to.
#[derive(Debug, Clone, Serialize)]
pub struct QuietCommand {
    pub uuid: String,
}

impl Command for QuietCommand {
    const COMMAND_TYPE: &'static str = "consistency.quiet";
}

impl Handle<QuietCommand> for ConsistencyAggregate {
    fn execute(&self, command: &QuietCommand) -> Result<Decision<ConsistencyEvent>, Rejected> {
        Ok(ConsistencyEvent::Quieted {
            uuid: command.uuid.clone(),
        }
        .into())
    }
}

/// Never routed.
#[derive(Debug, Clone, Serialize)]
pub struct UnroutedCommand {
    pub uuid: String,
}

impl Command for UnroutedCommand {
    const COMMAND_TYPE: &'static str = "consistency.unrouted";
}

// ---------------------------------------------------------------------------
// Prefixed example aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExampleEvent {
    Happened { uuid: String },
}

impl DomainEvent for ExampleEvent {
    fn event_type(&self) -> &'static str {
        EXAMPLE_HAPPENED
    }
}

#[derive(Debug, Default)]
pub struct ExampleAggregate {
    pub happened: u32,
}

impl Aggregate for ExampleAggregate {
    const AGGREGATE_TYPE: &'static str = "example";
    type Event = ExampleEvent;
    type Error = Rejected;

    fn apply(&mut self, _event: &Self::Event) {
        self.happened += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExampleCommand {
    pub uuid: String,
}

impl Command for ExampleCommand {
    const COMMAND_TYPE: &'static str = "example.happen";
}

impl Handle<ExampleCommand> for ExampleAggregate {
    fn execute(&self, command: &ExampleCommand) -> Result<Decision<ExampleEvent>, Rejected> {
        Ok(ExampleEvent::Happened {
            uuid: command.uuid.clone(),
        }
        .into())
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Sleeps for the event's `delay_ms` before acknowledging.
pub struct DelayHandler;

#[async_trait]
impl EventHandler for DelayHandler {
    async fn handle(&self, event: &StoredEvent, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        if let ConsistencyEvent::Executed { delay_ms, .. } = event.decode::<ConsistencyEvent>()? {
            sleep_ms(delay_ms).await;
        }
        Ok(())
    }
}

/// Reacts to `DispatchRequested` with a strong nested dispatch.
pub struct NestedDispatchHandler;

#[async_trait]
impl EventHandler for NestedDispatchHandler {
    async fn handle(&self, event: &StoredEvent, ctx: &HandlerContext) -> Result<(), HandlerError> {
        if let ConsistencyEvent::DispatchRequested { uuid, delay_ms } = event.decode::<ConsistencyEvent>()? {
            ctx.dispatch(
                ConsistencyCommand::new(&format!("{uuid}-nested"), delay_ms),
                DispatchOptions::strong(),
            )
            .await?;
        }
        Ok(())
    }
}

/// Records every event it handles.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<StoredEvent>>>,
}

impl RecordingHandler {
    pub fn seen(&self) -> Vec<StoredEvent> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &StoredEvent, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// How `FlakyHandler` misbehaves on a stream's first event.
#[derive(Debug, Clone, Copy)]
pub enum Misbehaviour {
    Error,
    Panic,
}

/// Fails on version 1 of every stream, then behaves.
pub struct FlakyHandler(pub Misbehaviour);

#[async_trait]
impl EventHandler for FlakyHandler {
    async fn handle(&self, event: &StoredEvent, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        if event.stream_version == 1 {
            match self.0 {
                Misbehaviour::Error => {
                    return Err(HandlerError::Failed("projection unavailable".to_owned()));
                }
                Misbehaviour::Panic => panic!("projection exploded"),
            }
        }
        Ok(())
    }
}

/// Never finishes.
pub struct StuckHandler;

#[async_trait]
impl EventHandler for StuckHandler {
    async fn handle(&self, _event: &StoredEvent, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

async fn sleep_ms(delay_ms: u64) {
    if delay_ms == SLEEP_FOREVER {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Every route used by the tests, with the test timeout and no handlers.
pub fn builder(repository: Arc<dyn EventRepository>) -> RouterBuilder {
    Router::builder(repository)
        .with_config(DispatcherConfig::with_default_timeout(TEST_TIMEOUT))
        .route::<ConsistencyCommand, ConsistencyAggregate>(IdentityRoute::field("uuid"))
        .route::<NoOpCommand, ConsistencyAggregate>(IdentityRoute::field("uuid"))
        .route::<RequestDispatchCommand, ConsistencyAggregate>(IdentityRoute::field("uuid"))
        .route::<FailingCommand, ConsistencyAggregate>(IdentityRoute::field("uuid"))
        .route::<MultiEventCommand, ConsistencyAggregate>(IdentityRoute::field("uuid"))
        .route::<QuietCommand, ConsistencyAggregate>(IdentityRoute::field("uuid"))
        .route::<ExampleCommand, ExampleAggregate>(
            IdentityRoute::field("uuid").with_prefix(EXAMPLE_PREFIX),
        )
}

/// Handlers wired into the standard router, kept so tests can inspect them.
#[derive(Clone, Default)]
pub struct Fixtures {
    pub example_projector: RecordingHandler,
    pub tick_projector: RecordingHandler,
    pub eventual_recorder: RecordingHandler,
}

/// The standard test router:
///
/// - `delay_handler` (strong): `Executed`, sleeps `delay_ms`
/// - `nested_dispatcher` (strong): `DispatchRequested`, strong nested dispatch
/// - `example_projector` (strong): `example.happened`
/// - `tick_projector` (strong): `Ticked`
/// - `eventual_recorder` (eventual): `Executed`, `Ticked`, `Quieted`
///
/// # Panics
///
/// Panics if the router cannot be built.
pub fn router(repository: Arc<dyn EventRepository>) -> (Router, Fixtures) {
    let fixtures = Fixtures::default();
    let router = builder(repository)
        .handler(
            HandlerRegistration::strong("delay_handler").handles([EXECUTED]),
            DelayHandler,
        )
        .handler(
            HandlerRegistration::strong("nested_dispatcher").handles([DISPATCH_REQUESTED]),
            NestedDispatchHandler,
        )
        .handler(
            HandlerRegistration::strong("example_projector").handles([EXAMPLE_HAPPENED]),
            fixtures.example_projector.clone(),
        )
        .handler(
            HandlerRegistration::strong("tick_projector").handles([TICKED]),
            fixtures.tick_projector.clone(),
        )
        .handler(
            HandlerRegistration::eventual("eventual_recorder").handles([EXECUTED, TICKED, QUIETED]),
            fixtures.eventual_recorder.clone(),
        )
        .build()
        .unwrap();
    (router, fixtures)
}

/// Polls `condition` every 5 ms until it holds or `limit` elapses.
pub async fn eventually<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
