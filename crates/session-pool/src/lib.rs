//! # session-pool
//!
//! Bounded async pool for expensive, reusable backend sessions such as
//! long-lived agent or model processes.
//!
//! Sessions are costly to start, so the pool keeps them warm between
//! requests, caps how many exist at once, and reclaims the ones that sit
//! idle for too long.
//!
//! ## Features
//!
//! - Hard cap on concurrently tracked sessions
//! - Idle reuse before creation, creation before waiting
//! - Strict FIFO hand-off to queued callers, with optional timeouts
//! - Background idle cleanup that respects a warm floor
//! - Orderly disposal that tears down every session exactly once
//! - Lifecycle events and counters for observability
//!
//! ## Example
//!
//! ```rust,ignore
//! use session_pool::{PoolBuilder, PoolConfig, SessionPool};
//! use std::time::Duration;
//!
//! // Using the builder pattern
//! let pool = PoolBuilder::new()
//!     .max_sessions(4)
//!     .idle_timeout(Duration::from_secs(300))
//!     .build(|| async { AgentSession::spawn().await })?;
//!
//! // Or using PoolConfig directly
//! let config = PoolConfig::new().max_sessions(4);
//! let pool = SessionPool::new(|| async { AgentSession::spawn().await }, config)?;
//!
//! // Explicit acquire/release
//! let session = pool.acquire().await?;
//! let reply = session.request(prompt).await?;
//! pool.release(&session).await;
//!
//! // Or a guard that releases on drop
//! let session = pool.get().await?;
//!
//! // Check pool status
//! let stats = pool.stats();
//! println!("Pool utilization: {:.1}%", stats.utilization());
//!
//! pool.dispose().await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod pool;

mod state;

// Configuration
pub use config::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SESSIONS, DEFAULT_MIN_SESSIONS,
    PoolConfig,
};

// Error types
pub use error::{BoxError, PoolError, PoolResult};

// Events
pub use events::{DestroyReason, PoolEvent, Subscription};

// Pool types
pub use pool::{PoolBuilder, PoolMetrics, PoolStats, PooledSession, SessionPool};

// Lifecycle management
pub use lifecycle::{PoolableSession, SessionFactory, SessionMetadata, SessionState};
