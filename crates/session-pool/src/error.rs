//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Boxed error used at the session and factory boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by the session pool.
///
/// Teardown failures never appear here: they are logged and counted in
/// [`PoolMetrics`](crate::PoolMetrics) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Invalid pool configuration.
    #[error("invalid pool configuration: {0}")]
    Config(String),

    /// The session factory failed. Display and source are the factory's own.
    #[error(transparent)]
    Factory(BoxError),

    /// The pool has been disposed.
    #[error("session pool has been disposed")]
    Disposed,

    /// No session became available within the wait budget.
    #[error("timed out after {waited:?} waiting for a pooled session")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// The factory produced a session whose id is already tracked.
    #[error("session id already tracked by this pool: {0}")]
    DuplicateSessionId(String),
}

impl PoolError {
    /// Whether this error is a wait timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this error was caused by disposal.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Whether this error came from the session factory.
    #[must_use]
    pub fn is_factory(&self) -> bool {
        matches!(self, Self::Factory(_))
    }

    /// Take the factory's original error out, if this is a factory failure.
    pub fn into_factory_error(self) -> Result<BoxError, Self> {
        match self {
            Self::Factory(err) => Ok(err),
            other => Err(other),
        }
    }
}
