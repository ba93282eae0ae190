//! Handler tasks.
//!
//! Each handler gets one pump task reading the store's subscription feed.
//! The pump drops events the handler does not subscribe to and forwards the
//! rest to a per-stream worker, creating workers on first sight of a stream.
//! A worker processes its stream strictly in order and acknowledges each
//! successfully handled event to the consistency tracker.
//!
//! A worker that sees nothing for the idle timeout closes its channel,
//! finishes whatever was already queued, and exits. The pump then starts a
//! replacement on the next event, and the replacement waits for its
//! predecessor before touching the stream so version order holds across the
//! handover. Finished workers are swept from the pump's table once per idle
//! period.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use courier_consistency::ConsistencyTracker;
use courier_core::repository::{EventRepository, EventSubscription, StoredEvent};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, warn};

use super::context::HandlerContext;
use super::handler::EventHandler;
use super::registration::HandlerRegistration;
use crate::router::RouterInner;

/// Owns the pump tasks; dropping it stops event delivery.
#[derive(Debug, Default)]
pub(crate) struct HandlerRuntime {
    pumps: Vec<JoinHandle<()>>,
}

impl HandlerRuntime {
    /// Subscribes every handler to `repository` and spawns its pump on
    /// `runtime`. Subscriptions are opened before this returns, so no event
    /// appended afterwards is missed.
    pub(crate) fn start(
        runtime: &Handle,
        handlers: Vec<(HandlerRegistration, Arc<dyn EventHandler>)>,
        repository: &dyn EventRepository,
        tracker: &ConsistencyTracker,
        router: &Weak<RouterInner>,
        idle_timeout: Duration,
    ) -> Self {
        let pumps = handlers
            .into_iter()
            .map(|(registration, handler)| {
                let subscription = repository.subscribe();
                let worker = Worker {
                    name: Arc::from(registration.name()),
                    handler,
                    tracker: tracker.clone(),
                    router: router.clone(),
                    // A zero period would make the pump's sweep interval panic.
                    idle_timeout: idle_timeout.max(Duration::from_millis(1)),
                };
                runtime.spawn(pump(registration, worker, subscription))
            })
            .collect();

        Self { pumps }
    }
}

impl Drop for HandlerRuntime {
    fn drop(&mut self) {
        for pump in &self.pumps {
            pump.abort();
        }
    }
}

struct Partition {
    sender: mpsc::UnboundedSender<StoredEvent>,
    task: JoinHandle<()>,
}

async fn pump(
    registration: HandlerRegistration,
    worker: Worker,
    mut subscription: EventSubscription,
) {
    let mut partitions: HashMap<String, Partition> = HashMap::new();
    let mut sweep = tokio::time::interval(worker.idle_timeout);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let event = tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = sweep.tick() => {
                partitions.retain(|_, partition| !partition.task.is_finished());
                continue;
            }
        };

        if !registration.subscribes_to(&event.event_type) {
            continue;
        }

        let (event, predecessor) = match partitions.get(&event.stream_id) {
            Some(partition) => match partition.sender.send(event) {
                Ok(()) => continue,
                // The worker idled out; its replacement waits for it.
                Err(mpsc::error::SendError(event)) => {
                    let predecessor = partitions
                        .remove(&event.stream_id)
                        .map(|partition| partition.task);
                    (event, predecessor)
                }
            },
            None => (event, None),
        };

        let stream_id = event.stream_id.clone();
        let (sender, rx) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is alive until the worker is spawned.
        let _ = sender.send(event);
        let task = tokio::spawn(worker.clone().run(stream_id.clone(), rx, predecessor));
        partitions.insert(stream_id, Partition { sender, task });
    }

    debug!(handler = registration.name(), "subscription closed");
}

#[derive(Clone)]
struct Worker {
    name: Arc<str>,
    handler: Arc<dyn EventHandler>,
    tracker: ConsistencyTracker,
    router: Weak<RouterInner>,
    idle_timeout: Duration,
}

impl Worker {
    async fn run(
        self,
        stream_id: String,
        mut rx: mpsc::UnboundedReceiver<StoredEvent>,
        predecessor: Option<JoinHandle<()>>,
    ) {
        if let Some(predecessor) = predecessor {
            // Only fails if the predecessor was aborted; nothing left to wait for.
            let _ = predecessor.await;
        }
        debug!(handler = %self.name, stream_id = %stream_id, "stream worker started");

        loop {
            match tokio::time::timeout(self.idle_timeout, rx.recv()).await {
                Ok(Some(event)) => self.handle_in_span(event).await,
                Ok(None) => break,
                Err(_) => {
                    rx.close();
                    while let Some(event) = rx.recv().await {
                        self.handle_in_span(event).await;
                    }
                    break;
                }
            }
        }

        debug!(handler = %self.name, stream_id = %stream_id, "stream worker idle, exiting");
    }

    async fn handle_in_span(&self, event: StoredEvent) {
        let span = info_span!(
            "handle_event",
            handler = %self.name,
            stream_id = %event.stream_id,
            version = event.stream_version,
            event_type = %event.event_type,
        );
        self.process(event).instrument(span).await;
    }

    async fn process(&self, event: StoredEvent) {
        let ctx = HandlerContext::new(self.router.clone(), &self.name, &event);
        let outcome = AssertUnwindSafe(self.handler.handle(&event, &ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                self.tracker
                    .report(&event.stream_id, event.stream_version, &self.name);
            }
            Ok(Err(err)) => {
                warn!(error = %err, "handler failed; event not acknowledged");
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_owned());
                error!(panic = %message, "handler panicked; event not acknowledged");
            }
        }
    }
}
