//! Domain event abstractions.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DomainError;

/// Trait that all domain events implement.
///
/// An aggregate's event type is usually an enum with one variant per event;
/// the serialized enum is what lands in the store as the event payload, and
/// `event_type` is the identifier handlers subscribe to.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + Send + Sync + std::fmt::Debug + 'static
{
    /// Returns the event type name (used for handler subscription routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the event cannot be
    /// represented as JSON (for example, a map with non-string keys).
    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(self)
            .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))
    }
}
