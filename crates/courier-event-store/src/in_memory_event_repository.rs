//! In-memory implementation of the `EventRepository` trait.
//!
//! Streams live in a single map guarded by a mutex. Appends check the
//! expected version, assign versions, and push the stored events to every
//! open subscription while the lock is still held, so subscribers observe
//! events in exactly the order they were committed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use courier_core::error::DomainError;
use courier_core::repository::{EventRepository, EventSubscription, NewEvent, StoredEvent};

#[derive(Debug, Default)]
struct Streams {
    events: HashMap<String, Vec<StoredEvent>>,
    subscribers: Vec<mpsc::UnboundedSender<StoredEvent>>,
}

/// Event repository backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: Mutex<Streams>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current version of `stream_id` (0 if it has no events).
    pub fn stream_version(&self, stream_id: &str) -> u64 {
        self.lock()
            .events
            .get(stream_id)
            .and_then(|events| events.last())
            .map_or(0, |event| event.stream_version)
    }

    fn lock(&self) -> MutexGuard<'_, Streams> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(
        &self,
        stream_id: &str,
        from_version: u64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let streams = self.lock();
        let events = streams
            .events
            .get(stream_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.stream_version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut streams = self.lock();
        let Streams {
            events: all_events,
            subscribers,
        } = &mut *streams;

        let stream = all_events.entry(stream_id.to_owned()).or_default();
        let actual = stream.last().map_or(0, |event| event.stream_version);
        if actual != expected_version {
            return Err(DomainError::WrongExpectedVersion {
                stream_id: stream_id.to_owned(),
                expected: expected_version,
                actual,
            });
        }

        let stored: Vec<StoredEvent> = events
            .into_iter()
            .zip(actual + 1..)
            .map(|(event, version)| StoredEvent::from_new(event, stream_id, version))
            .collect();
        stream.extend(stored.iter().cloned());

        subscribers.retain(|subscriber| {
            stored
                .iter()
                .all(|event| subscriber.send(event.clone()).is_ok())
        });

        debug!(
            stream_id,
            count = stored.len(),
            version = stored.last().map_or(actual, |event| event.stream_version),
            "events appended"
        );

        Ok(stored)
    }

    fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }
}
