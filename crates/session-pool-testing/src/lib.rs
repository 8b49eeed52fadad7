//! # session-pool-testing
//!
//! Test infrastructure for the session pool.
//!
//! This crate provides:
//!
//! - [`MockSession`] and [`MockFactory`] with failure injection
//! - [`CallRecorder`] for asserting on factory and session calls
//! - Small helpers for driving a pool from tests
//!
//! Pool integration tests live in this crate's `tests/` directory so the
//! pool crate itself does not need a dev-dependency cycle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use session_pool::{PoolConfig, SessionPool};
//! use session_pool_testing::MockFactory;
//!
//! let factory = MockFactory::new("agent");
//! let recorder = factory.recorder();
//! let pool = SessionPool::new(factory, PoolConfig::new().max_sessions(2))?;
//!
//! let session = pool.acquire().await?;
//! pool.release(&session).await;
//! assert_eq!(recorder.creates(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;
pub mod recorder;

use std::time::Duration;

use session_pool::{PoolConfig, PoolableSession, SessionPool};

pub use mock::{MockFactory, MockSession};
pub use recorder::{Call, CallRecorder};

/// A pool of [`MockSession`]s.
pub type MockPool = SessionPool<MockSession>;

/// Install a test-friendly tracing subscriber.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Configuration with the background cleanup task disabled.
///
/// Tests that trigger cleanup by hand use this so the timer never races
/// them.
#[must_use]
pub fn manual_cleanup_config() -> PoolConfig {
    PoolConfig::new().cleanup_interval(Duration::ZERO)
}

/// Yield until at least `count` callers are queued on the pool.
pub async fn wait_for_waiters<S: PoolableSession>(pool: &SessionPool<S>, count: usize) {
    while pool.stats().waiting_requests < count {
        tokio::task::yield_now().await;
    }
}
