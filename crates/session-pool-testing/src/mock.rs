//! Mock session and factory.
//!
//! [`MockFactory`] is cheap to clone; clones share counters and failure
//! injection, so a test can keep one handle while the pool owns another.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use session_pool::{BoxError, PoolableSession, SessionFactory};

use crate::recorder::{Call, CallRecorder};

/// A session that echoes requests and records its calls.
#[derive(Debug)]
pub struct MockSession {
    id: String,
    recorder: CallRecorder,
    fail_teardown: bool,
    teardowns: AtomicUsize,
}

impl MockSession {
    /// Create a standalone session.
    pub fn new(id: impl Into<String>, recorder: CallRecorder) -> Self {
        Self {
            id: id.into(),
            recorder,
            fail_teardown: false,
            teardowns: AtomicUsize::new(0),
        }
    }

    /// Number of times `teardown` ran on this session.
    #[must_use]
    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    /// Whether `teardown` ran at least once.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.teardown_count() > 0
    }
}

#[async_trait]
impl PoolableSession for MockSession {
    type Request = String;
    type Response = String;

    fn session_id(&self) -> &str {
        &self.id
    }

    async fn request(&self, request: String) -> Result<String, BoxError> {
        if self.is_torn_down() {
            return Err(format!("session {} is closed", self.id).into());
        }
        self.recorder.record(Call::Request {
            session_id: self.id.clone(),
        });
        Ok(format!("{}: {request}", self.id))
    }

    async fn teardown(&self) -> Result<(), BoxError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.recorder.record(Call::Teardown {
            session_id: self.id.clone(),
        });
        if self.fail_teardown {
            return Err(format!("teardown of {} failed", self.id).into());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct FactoryInner {
    prefix: String,
    next: AtomicU64,
    recorder: CallRecorder,
    fail_next: AtomicUsize,
    always_fail: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    fail_teardowns: AtomicBool,
    fixed_id: Mutex<Option<String>>,
}

/// A session factory with failure injection.
///
/// Sessions get ids `"{prefix}-0"`, `"{prefix}-1"`, ...
#[derive(Debug, Clone)]
pub struct MockFactory {
    inner: Arc<FactoryInner>,
}

impl MockFactory {
    /// Create a factory with its own recorder.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_recorder(prefix, CallRecorder::new())
    }

    /// Create a factory that logs to `recorder`.
    pub fn with_recorder(prefix: impl Into<String>, recorder: CallRecorder) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                prefix: prefix.into(),
                next: AtomicU64::new(0),
                recorder,
                fail_next: AtomicUsize::new(0),
                always_fail: Mutex::new(None),
                delay: Mutex::new(None),
                fail_teardowns: AtomicBool::new(false),
                fixed_id: Mutex::new(None),
            }),
        }
    }

    /// The recorder shared by this factory and its sessions.
    #[must_use]
    pub fn recorder(&self) -> CallRecorder {
        self.inner.recorder.clone()
    }

    /// Reject every call with `message` until [`recover`](Self::recover).
    pub fn always_fail(&self, message: impl Into<String>) {
        *self.inner.always_fail.lock() = Some(message.into());
    }

    /// Stop failing.
    pub fn recover(&self) {
        *self.inner.always_fail.lock() = None;
        self.inner.fail_next.store(0, Ordering::SeqCst);
    }

    /// Reject the next `count` calls.
    pub fn fail_next(&self, count: usize) {
        self.inner.fail_next.store(count, Ordering::SeqCst);
    }

    /// Sleep this long inside every call.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.inner.delay.lock() = delay;
    }

    /// Make sessions created from now on fail their teardown.
    pub fn fail_teardowns(&self, fail: bool) {
        self.inner.fail_teardowns.store(fail, Ordering::SeqCst);
    }

    /// Give every session created from now on the same id.
    pub fn set_fixed_id(&self, id: Option<String>) {
        *self.inner.fixed_id.lock() = id;
    }

    /// Number of sessions produced so far.
    #[must_use]
    pub fn created(&self) -> u64 {
        self.inner.next.load(Ordering::SeqCst)
    }

    fn reject(&self, message: String) -> BoxError {
        self.inner.recorder.record(Call::CreateFailed {
            message: message.clone(),
        });
        message.into()
    }
}

#[async_trait]
impl SessionFactory<MockSession> for MockFactory {
    async fn create(&self) -> Result<MockSession, BoxError> {
        let delay = *self.inner.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.inner.always_fail.lock().clone();
        if let Some(message) = failure {
            return Err(self.reject(message));
        }

        let injected = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(self.reject("injected factory failure".to_string()));
        }

        let n = self.inner.next.fetch_add(1, Ordering::SeqCst);
        let fixed = self.inner.fixed_id.lock().clone();
        let id = fixed.unwrap_or_else(|| format!("{}-{n}", self.inner.prefix));

        self.inner.recorder.record(Call::Create {
            session_id: id.clone(),
        });

        let mut session = MockSession::new(id, self.inner.recorder.clone());
        session.fail_teardown = self.inner.fail_teardowns.load(Ordering::SeqCst);
        Ok(session)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_ids() {
        let factory = MockFactory::new("agent");
        let a = factory.create().await.unwrap();
        let b = factory.create().await.unwrap();

        assert_eq!(a.session_id(), "agent-0");
        assert_eq!(b.session_id(), "agent-1");
        assert_eq!(factory.created(), 2);
        assert_eq!(factory.recorder().creates(), 2);
    }

    #[tokio::test]
    async fn test_fail_next_then_recover() {
        let factory = MockFactory::new("agent");
        factory.fail_next(1);

        assert!(factory.create().await.is_err());
        assert!(factory.create().await.is_ok());
        assert_eq!(factory.recorder().create_failures(), 1);
    }

    #[tokio::test]
    async fn test_always_fail_message() {
        let factory = MockFactory::new("agent");
        factory.always_fail("boom");

        let err = factory.create().await.err().unwrap();
        assert_eq!(err.to_string(), "boom");

        factory.recover();
        assert!(factory.create().await.is_ok());
    }

    #[tokio::test]
    async fn test_session_teardown_counts_and_fails() {
        let factory = MockFactory::new("agent");
        factory.fail_teardowns(true);
        let session = factory.create().await.unwrap();

        assert_eq!(session.request("hi".to_string()).await.unwrap(), "agent-0: hi");
        assert!(session.teardown().await.is_err());
        assert!(session.teardown().await.is_err());
        assert_eq!(session.teardown_count(), 2);
        assert!(session.request("again".to_string()).await.is_err());
    }
}
