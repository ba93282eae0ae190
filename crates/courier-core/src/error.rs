//! Domain error types.

use thiserror::Error;

/// Errors raised by event stores and aggregate loading.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No events exist for the requested stream.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),

    /// Optimistic concurrency conflict: another writer appended first.
    #[error("wrong expected version on stream {stream_id}: expected {expected}, found {actual}")]
    WrongExpectedVersion {
        /// The stream that had the conflict.
        stream_id: String,
        /// The version the writer loaded.
        expected: u64,
        /// The version actually found in the store.
        actual: u64,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
