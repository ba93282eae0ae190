//! Test repositories: `EventRepository` doubles for error paths and call
//! inspection.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_core::error::DomainError;
use courier_core::repository::{EventRepository, EventSubscription, NewEvent, StoredEvent};
use tokio::sync::mpsc;

/// A subscription that never yields; its sender is already gone.
fn closed_subscription() -> EventSubscription {
    let (_, rx) = mpsc::unbounded_channel();
    rx
}

/// Wraps another repository and records every append that reaches it.
pub struct RecordingEventRepository {
    inner: Arc<dyn EventRepository>,
    appended: Mutex<Vec<(String, u64, Vec<NewEvent>)>>,
}

impl RecordingEventRepository {
    /// Record appends on their way to `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn EventRepository>) -> Self {
        Self {
            inner,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of `(stream_id, expected_version, events)` per append call,
    /// including calls the inner repository rejected.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(String, u64, Vec<NewEvent>)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(
        &self,
        stream_id: &str,
        from_version: u64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(stream_id, from_version).await
    }

    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.appended.lock().unwrap().push((
            stream_id.to_owned(),
            expected_version,
            events.clone(),
        ));
        self.inner
            .append_events(stream_id, expected_version, events)
            .await
    }

    fn subscribe(&self) -> EventSubscription {
        self.inner.subscribe()
    }
}

/// Always empty; appends are accepted and dropped.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(
        &self,
        _stream_id: &str,
        _from_version: u64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(events
            .into_iter()
            .zip(expected_version + 1..)
            .map(|(event, version)| StoredEvent::from_new(event, stream_id, version))
            .collect())
    }

    fn subscribe(&self) -> EventSubscription {
        closed_subscription()
    }
}

/// Every call fails with an infrastructure error.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(
        &self,
        _stream_id: &str,
        _from_version: u64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _stream_id: &str,
        _expected_version: u64,
        _events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    fn subscribe(&self) -> EventSubscription {
        closed_subscription()
    }
}

/// Loads fine but rejects every append as if another writer got there first.
#[derive(Debug, Default)]
pub struct ConflictingEventRepository {
    /// Version reported as the stream's actual version.
    pub actual_version: u64,
}

#[async_trait]
impl EventRepository for ConflictingEventRepository {
    async fn load_events(
        &self,
        _stream_id: &str,
        _from_version: u64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: u64,
        _events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::WrongExpectedVersion {
            stream_id: stream_id.to_owned(),
            expected: expected_version,
            actual: self.actual_version,
        })
    }

    fn subscribe(&self) -> EventSubscription {
        closed_subscription()
    }
}
