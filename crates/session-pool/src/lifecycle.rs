//! Session lifecycle contracts.
//!
//! The pool never looks inside a session. It needs a stable identifier to
//! track the handle and a teardown hook to call when the handle leaves the
//! pool. The request/response operation is part of the contract so callers
//! can write code generic over any poolable session, but the pool itself
//! never calls it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::BoxError;

/// A reusable, expensive-to-create backend session.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use session_pool::{BoxError, PoolableSession};
///
/// struct EchoSession {
///     id: String,
/// }
///
/// #[async_trait]
/// impl PoolableSession for EchoSession {
///     type Request = String;
///     type Response = String;
///
///     fn session_id(&self) -> &str {
///         &self.id
///     }
///
///     async fn request(&self, request: String) -> Result<String, BoxError> {
///         Ok(request)
///     }
///
///     async fn teardown(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait PoolableSession: Send + Sync + 'static {
    /// Request payload accepted by the session.
    type Request: Send + 'static;

    /// Response payload produced by the session.
    type Response: Send + 'static;

    /// Stable identifier, unique within one pool.
    fn session_id(&self) -> &str;

    /// Send a request to the backend and wait for its response.
    async fn request(&self, request: Self::Request) -> Result<Self::Response, BoxError>;

    /// Release the backend resources held by this session.
    ///
    /// May be called more than once for a session that was in use when its
    /// pool was disposed and is released afterwards.
    async fn teardown(&self) -> Result<(), BoxError>;
}

/// Builds new sessions on demand.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<S, E>>` closure,
/// so most callers never implement it by hand.
#[async_trait]
pub trait SessionFactory<S>: Send + Sync + 'static {
    /// Create a new session.
    async fn create(&self) -> Result<S, BoxError>;
}

#[async_trait]
impl<S, F, Fut, E> SessionFactory<S> for F
where
    S: PoolableSession,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    async fn create(&self) -> Result<S, BoxError> {
        self().await.map_err(Into::into)
    }
}

/// Whether a tracked session is held by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Available for reuse or idle eviction.
    Idle,
    /// Held by exactly one caller.
    InUse,
}

impl SessionState {
    /// Whether the session is idle.
    #[must_use]
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

/// Snapshot of a tracked session's bookkeeping.
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    /// Session identifier.
    pub id: String,
    /// Current state.
    pub state: SessionState,
    /// When the session entered the pool.
    pub created_at: Instant,
    /// When the session last became idle.
    pub last_released_at: Option<Instant>,
    /// Number of times the session was handed to a caller.
    pub acquire_count: u64,
}

impl SessionMetadata {
    /// Time since the session entered the pool.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the session became idle, or `None` while in use.
    #[must_use]
    pub fn idle_for(&self) -> Option<Duration> {
        match self.state {
            SessionState::Idle => self.last_released_at.map(|at| at.elapsed()),
            SessionState::InUse => None,
        }
    }
}
