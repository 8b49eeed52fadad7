//! Pool configuration.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Default maximum number of concurrently tracked sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 5;

/// Default number of warm sessions kept through idle cleanup.
pub const DEFAULT_MIN_SESSIONS: usize = 0;

/// Default age after which an idle session becomes eligible for cleanup.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default period of the background cleanup task.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a [`SessionPool`](crate::SessionPool).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use session_pool::PoolConfig;
///
/// let config = PoolConfig::new()
///     .max_sessions(8)
///     .min_sessions(2)
///     .idle_timeout(Duration::from_secs(120));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Hard cap on tracked sessions (idle + in use).
    pub max_sessions: usize,

    /// Idle cleanup never evicts below this many tracked sessions.
    pub min_sessions: usize,

    /// Age after which an idle session may be evicted.
    pub idle_timeout: Duration,

    /// Period of the background cleanup task. Zero disables the task.
    pub cleanup_interval: Duration,

    /// Default wait budget for [`SessionPool::acquire`](crate::SessionPool::acquire).
    ///
    /// `None` waits until a session frees up or the pool is disposed.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            min_sessions: DEFAULT_MIN_SESSIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            acquire_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of sessions.
    #[must_use]
    pub fn max_sessions(mut self, count: usize) -> Self {
        self.max_sessions = count;
        self
    }

    /// Set the minimum number of sessions kept warm.
    #[must_use]
    pub fn min_sessions(mut self, count: usize) -> Self {
        self.min_sessions = count;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the cleanup interval.
    #[must_use]
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the default acquire timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Whether the background cleanup task should run.
    #[must_use]
    pub fn cleanup_enabled(&self) -> bool {
        !self.cleanup_interval.is_zero()
    }

    /// Validate the configuration.
    ///
    /// Durations cannot be negative, so only the session bounds are checked.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_sessions == 0 {
            return Err(PoolError::Config(
                "max_sessions must be at least 1".to_string(),
            ));
        }

        if self.min_sessions > self.max_sessions {
            return Err(PoolError::Config(format!(
                "min_sessions ({}) cannot exceed max_sessions ({})",
                self.min_sessions, self.max_sessions
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
        assert_eq!(config.min_sessions, DEFAULT_MIN_SESSIONS);
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(config.cleanup_interval, DEFAULT_CLEANUP_INTERVAL);
        assert!(config.acquire_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_max_rejected() {
        let err = PoolConfig::new().max_sessions(0).validate().unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
        assert!(err.to_string().contains("max_sessions"));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let err = PoolConfig::new()
            .max_sessions(2)
            .min_sessions(3)
            .validate()
            .unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn test_min_equal_to_max_accepted() {
        let config = PoolConfig::new().max_sessions(3).min_sessions(3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_disables_cleanup() {
        let config = PoolConfig::new().cleanup_interval(Duration::ZERO);
        assert!(!config.cleanup_enabled());
        assert!(PoolConfig::default().cleanup_enabled());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_partial_config() {
        let config: PoolConfig = serde_json::from_str(r#"{"max_sessions": 12}"#).unwrap();
        assert_eq!(config.max_sessions, 12);
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
    }
}
