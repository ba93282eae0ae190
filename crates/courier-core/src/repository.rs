//! Event store interface.
//!
//! The durable log itself is a collaborator: anything that offers an ordered,
//! per-stream append-only log with optimistic concurrency on the expected
//! version, forward reads, and a feed of newly appended events can back the
//! router.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::DomainError;

/// An event ready to be appended. The store assigns its stream version.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type name for handler routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Stream (aggregate identity) this event belongs to.
    pub stream_id: String,
    /// Version within the stream, starting at 1 with no gaps.
    pub stream_version: u64,
    /// Event type name for handler routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Places a new event at `stream_version` of `stream_id`.
    #[must_use]
    pub fn from_new(event: NewEvent, stream_id: &str, stream_version: u64) -> Self {
        Self {
            event_id: event.event_id,
            stream_id: stream_id.to_owned(),
            stream_version,
            event_type: event.event_type,
            payload: event.payload,
            correlation_id: event.correlation_id,
            causation_id: event.causation_id,
            occurred_at: event.occurred_at,
        }
    }

    /// Deserializes the payload into a concrete event type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload does not match `E`.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, DomainError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!(
                "event deserialization failed for {} at {}@{}: {e}",
                self.event_type, self.stream_id, self.stream_version
            ))
        })
    }
}

/// Feed of every event appended after the subscription was opened, in the
/// order the store committed them.
pub type EventSubscription = mpsc::UnboundedReceiver<StoredEvent>;

/// Repository trait for loading and appending domain events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Load the events of `stream_id` whose version is at least
    /// `from_version`, ordered by version. `0` reads the whole stream.
    async fn load_events(
        &self,
        stream_id: &str,
        from_version: u64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Append new events to a stream with optimistic concurrency.
    /// `expected_version` is the last version the writer observed (0 for a
    /// new stream). Returns the events as stored; the last one carries the
    /// new stream version.
    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Opens a feed of all events appended from now on.
    fn subscribe(&self) -> EventSubscription;
}
