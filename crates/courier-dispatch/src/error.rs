//! Dispatch and registration errors.

use std::time::Duration;

use courier_core::error::DomainError;
use thiserror::Error;

/// Boxed failure declared by an aggregate's command handler.
pub type ExecutionFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced to the caller of `Router::dispatch`.
///
/// None of these are retried by the router.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route is registered for the command type.
    #[error("unregistered command: {0}")]
    UnregisteredCommand(String),

    /// The command's identity field is missing or unusable.
    #[error("invalid identity: command {command_type} has no usable `{field}` value")]
    InvalidIdentity {
        /// The command type being dispatched.
        command_type: &'static str,
        /// The configured identity field.
        field: String,
    },

    /// The aggregate rejected the command. The aggregate's own error is
    /// carried unchanged.
    #[error(transparent)]
    AggregateExecutionFailed(ExecutionFailure),

    /// A concurrent writer appended to the stream first.
    #[error("wrong expected version on stream {stream_id}: expected {expected}, found {actual}")]
    WrongExpectedVersion {
        /// The stream that had the conflict.
        stream_id: String,
        /// The version loaded before deciding.
        expected: u64,
        /// The version found at append time.
        actual: u64,
    },

    /// Strong handlers did not finish within the timeout. The events are
    /// persisted and the handlers keep running.
    #[error("consistency timeout after {timeout:?} on stream {stream_id}")]
    ConsistencyTimeout {
        /// The stream whose events were being awaited.
        stream_id: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The event store failed.
    #[error("event store error: {0}")]
    Store(DomainError),

    /// A handler tried to dispatch after the router was dropped.
    #[error("router has shut down")]
    RouterShutdown,
}

impl DispatchError {
    /// Returns the aggregate's declared failure if it is of type `E`.
    #[must_use]
    pub fn execution_error<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::AggregateExecutionFailed(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::WrongExpectedVersion {
                stream_id,
                expected,
                actual,
            } => Self::WrongExpectedVersion {
                stream_id,
                expected,
                actual,
            },
            other => Self::Store(other),
        }
    }
}

/// Errors raised while building a router.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Two routes were registered for the same command type.
    #[error("command {0} is already routed")]
    DuplicateCommand(&'static str),

    /// Two handlers were registered under the same name.
    #[error("handler {0} is already registered")]
    DuplicateHandler(String),

    /// The router was built outside a Tokio runtime, so handler tasks
    /// cannot be spawned.
    #[error("no Tokio runtime available to host event handlers")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("insufficient funds")]
    struct InsufficientFunds;

    #[test]
    fn test_version_conflict_maps_to_wrong_expected_version() {
        let err = DispatchError::from(DomainError::WrongExpectedVersion {
            stream_id: "account-1".to_owned(),
            expected: 1,
            actual: 2,
        });

        assert!(matches!(
            err,
            DispatchError::WrongExpectedVersion {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_other_store_errors_map_to_store() {
        let err = DispatchError::from(DomainError::Infrastructure("disk full".into()));

        assert!(matches!(
            err,
            DispatchError::Store(DomainError::Infrastructure(_))
        ));
    }

    #[test]
    fn test_execution_failure_is_preserved_verbatim() {
        let err = DispatchError::AggregateExecutionFailed(Box::new(InsufficientFunds));

        assert_eq!(err.to_string(), "insufficient funds");
        assert_eq!(
            err.execution_error::<InsufficientFunds>(),
            Some(&InsufficientFunds)
        );
        assert_eq!(
            DispatchError::RouterShutdown.execution_error::<InsufficientFunds>(),
            None
        );
    }
}
