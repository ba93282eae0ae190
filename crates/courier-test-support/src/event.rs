use chrono::{TimeZone, Utc};
use courier_core::repository::NewEvent;
use uuid::Uuid;

/// A `NewEvent` of `event_type` with `payload`, fresh IDs, and a fixed
/// timestamp.
#[must_use]
pub fn new_event(event_type: &str, payload: serde_json::Value) -> NewEvent {
    let correlation_id = Uuid::new_v4();
    NewEvent {
        event_id: Uuid::new_v4(),
        event_type: event_type.to_owned(),
        payload,
        correlation_id,
        causation_id: correlation_id,
        occurred_at: Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default(),
    }
}
