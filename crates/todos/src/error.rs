//! Error types for the todos service.

use thiserror::Error;
use todos_server::{InvalidTransition, ServerError};
use todos_store::StoreError;

/// Result type for lifecycle operations.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// Fatal conditions of a service run. Each one ends the process with a
/// non-zero exit status.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Termination signal handlers could not be installed.
    #[error("failed to register signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    /// The store could not be opened.
    #[error("failed to open store: {0}")]
    Store(#[source] StoreError),

    /// The listener could not be bound, or stopped on its own.
    #[error("listener failed: {0}")]
    Listener(#[source] ServerError),

    /// The listener stopped before shutdown was requested.
    #[error("listener stopped unexpectedly")]
    ListenerStopped,

    /// The bounded drain did not complete cleanly.
    #[error("graceful shutdown failed: {0}")]
    Drain(#[source] ServerError),

    /// Releasing a resource after the drain failed.
    #[error("teardown failed: {message}")]
    Teardown {
        /// What failed
        message: String,
    },

    /// The lifecycle state machine was driven out of order.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl LifecycleError {
    /// Create a teardown error.
    pub fn teardown(message: impl Into<String>) -> Self {
        Self::Teardown {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use todos_server::LifecycleState;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = LifecycleError::Drain(ServerError::DrainTimeout {
            remaining: 1,
            ceiling: Duration::from_secs(30),
        });
        assert!(err.to_string().starts_with("graceful shutdown failed"));

        let err = LifecycleError::Store(StoreError::Closed);
        assert_eq!(err.to_string(), "failed to open store: store is closed");

        let err = LifecycleError::teardown("store close failed");
        assert!(err.to_string().contains("store close failed"));
    }

    #[test]
    fn test_from_invalid_transition() {
        let err: LifecycleError = InvalidTransition {
            from: LifecycleState::Terminated,
            to: LifecycleState::Serving,
        }
        .into();
        assert!(err.to_string().contains("terminated"));
    }
}
