//! Session pool implementation.
//!
//! This module provides a bounded pool of expensive backend sessions with
//! FIFO admission, idle reclamation and orderly disposal.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::events::{DestroyReason, EventHub, PoolEvent, Subscription};
use crate::lifecycle::{PoolableSession, SessionFactory, SessionMetadata};
use crate::state::{Admission, Grant, GrantReceiver, PoolState, Rejected, ReleaseOutcome};

/// A bounded pool of reusable backend sessions.
///
/// The pool hands out idle sessions first, creates new ones through its
/// factory while below `max_sessions`, and queues callers FIFO once at
/// capacity. Idle sessions older than `idle_timeout` are reclaimed by a
/// background task, down to `min_sessions`.
///
/// Cloning the pool is cheap; all clones share the same sessions.
///
/// # Example
///
/// ```rust,ignore
/// use session_pool::{PoolConfig, SessionPool};
///
/// let pool = SessionPool::new(
///     || async { AgentSession::spawn().await },
///     PoolConfig::new().max_sessions(4),
/// )?;
///
/// let session = pool.acquire().await?;
/// let reply = session.request(prompt).await?;
/// pool.release(&session).await;
///
/// pool.dispose().await;
/// ```
pub struct SessionPool<S: PoolableSession> {
    inner: Arc<PoolInner<S>>,
}

struct PoolInner<S: PoolableSession> {
    /// Pool configuration.
    config: PoolConfig,

    /// Builds new sessions.
    factory: Box<dyn SessionFactory<S>>,

    /// Entries, waiters and reservations.
    state: Mutex<PoolState<S>>,

    /// Lifecycle listeners.
    events: EventHub,

    /// When the pool was created.
    created_at: Instant,

    /// Pool metrics.
    metrics: Mutex<PoolMetricsInner>,

    /// Background idle cleanup task, if running.
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    /// Total sessions created.
    sessions_created: u64,
    /// Total sessions torn down.
    sessions_destroyed: u64,
    /// Sessions evicted by idle cleanup.
    sessions_evicted: u64,
    /// Total successful acquisitions.
    acquires_successful: u64,
    /// Total failed acquisitions (timeouts, disposal, factory errors).
    acquires_failed: u64,
    /// Acquisitions that gave up waiting.
    acquire_timeouts: u64,
    /// Factory calls that failed.
    factory_failures: u64,
    /// Teardowns that failed.
    teardown_failures: u64,
}

impl<S: PoolableSession> SessionPool<S> {
    /// Create a new pool with the given factory and configuration.
    ///
    /// Fails with [`PoolError::Config`] if the configuration is invalid.
    /// When called inside a Tokio runtime, a background task runs idle
    /// cleanup every `cleanup_interval`.
    pub fn new<F>(factory: F, config: PoolConfig) -> PoolResult<Self>
    where
        F: SessionFactory<S>,
    {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState::new(config.max_sessions)),
            factory: Box::new(factory),
            events: EventHub::new(),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
            cleanup_task: Mutex::new(None),
            config,
        });

        if let Some(task) = spawn_cleanup_task(&inner) {
            *inner.cleanup_task.lock() = Some(task);
        }

        info!(
            min = inner.config.min_sessions,
            max = inner.config.max_sessions,
            idle_timeout_ms = inner.config.idle_timeout.as_millis() as u64,
            "session pool created"
        );

        Ok(Self { inner })
    }

    /// Get a session, waiting up to the configured `acquire_timeout`.
    ///
    /// Returns an idle session if one exists, otherwise creates one if the
    /// pool is below capacity, otherwise waits for a release. The caller
    /// must hand the session back with [`release`](Self::release) or
    /// [`destroy`](Self::destroy).
    pub async fn acquire(&self) -> PoolResult<Arc<S>> {
        self.inner.acquire(self.inner.config.acquire_timeout).await
    }

    /// Get a session, waiting at most `timeout` if the pool is at capacity.
    pub async fn acquire_timeout(&self, timeout: Duration) -> PoolResult<Arc<S>> {
        self.inner.acquire(Some(timeout)).await
    }

    /// Take an idle session without creating or waiting.
    ///
    /// Returns `None` if no session is idle right now.
    pub fn try_acquire(&self) -> PoolResult<Option<Arc<S>>> {
        let taken = {
            let mut state = self.inner.state.lock();
            if state.is_disposed() {
                return Err(PoolError::Disposed);
            }
            state.take_idle()
        };

        if let Some(session) = &taken {
            self.inner.acquired(session, true);
            self.inner.metrics.lock().acquires_successful += 1;
        }
        Ok(taken)
    }

    /// Like [`acquire`](Self::acquire), but returns a guard that releases
    /// the session when dropped.
    pub async fn get(&self) -> PoolResult<PooledSession<S>> {
        let session = self.acquire().await?;
        Ok(PooledSession::new(session, Arc::clone(&self.inner)))
    }

    /// Like [`acquire_timeout`](Self::acquire_timeout), but returns a guard.
    pub async fn get_timeout(&self, timeout: Duration) -> PoolResult<PooledSession<S>> {
        let session = self.acquire_timeout(timeout).await?;
        Ok(PooledSession::new(session, Arc::clone(&self.inner)))
    }

    /// Return a session for reuse.
    ///
    /// If a caller is waiting, the session goes straight to it. Releasing a
    /// session this pool does not hold as in use does nothing. After
    /// disposal the session is torn down instead.
    pub async fn release(&self, session: &S) {
        self.inner.release(session).await;
    }

    /// Remove a session from the pool permanently and tear it down.
    ///
    /// Teardown errors are logged, never returned. If a caller is queued,
    /// the freed slot is handed to it and it creates a fresh session.
    pub async fn destroy(&self, session: &S) {
        self.inner.destroy(session).await;
    }

    /// Evict idle sessions past `idle_timeout`, oldest first, keeping at
    /// least `min_sessions`. Returns the number evicted.
    pub async fn cleanup_idle_sessions(&self) -> usize {
        self.inner.cleanup_idle().await
    }

    /// Tear down every session, reject every waiter and stop the cleanup
    /// task. Calling it again does nothing.
    pub async fn dispose(&self) {
        self.inner.dispose().await;
    }

    /// Check if the pool has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().is_disposed()
    }

    /// Get the current pool status.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        let total = state.total();
        let idle = state.idle();

        PoolStats {
            total_sessions: total,
            in_use_sessions: total - idle,
            idle_sessions: idle,
            waiting_requests: state.waiting(),
            max_sessions: self.inner.config.max_sessions,
            idle_timeout: self.inner.config.idle_timeout,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            sessions_created: inner.sessions_created,
            sessions_destroyed: inner.sessions_destroyed,
            sessions_evicted: inner.sessions_evicted,
            acquires_successful: inner.acquires_successful,
            acquires_failed: inner.acquires_failed,
            acquire_timeouts: inner.acquire_timeouts,
            factory_failures: inner.factory_failures,
            teardown_failures: inner.teardown_failures,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Bookkeeping snapshot of every tracked session.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionMetadata> {
        self.inner.state.lock().metadata()
    }

    /// Register a lifecycle listener.
    ///
    /// The listener stays registered until the returned handle is dropped
    /// or the pool is disposed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PoolEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl<S: PoolableSession> Clone for SessionPool<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PoolableSession> std::fmt::Debug for SessionPool<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<S: PoolableSession> PoolInner<S> {
    async fn acquire(&self, timeout: Option<Duration>) -> PoolResult<Arc<S>> {
        let result = self.checkout(timeout).await;

        let mut metrics = self.metrics.lock();
        match &result {
            Ok(_) => metrics.acquires_successful += 1,
            Err(err) => {
                metrics.acquires_failed += 1;
                if err.is_timeout() {
                    metrics.acquire_timeouts += 1;
                }
            }
        }
        drop(metrics);

        result
    }

    async fn checkout(&self, timeout: Option<Duration>) -> PoolResult<Arc<S>> {
        let admission = self.state.lock().admit(self.config.max_sessions);

        match admission {
            Admission::Disposed => Err(PoolError::Disposed),
            Admission::Reused(session) => {
                self.acquired(&session, true);
                Ok(session)
            }
            Admission::Create => self.create_reserved().await,
            Admission::Wait(id, rx) => self.wait(id, rx, timeout).await,
        }
    }

    async fn wait(
        &self,
        id: u64,
        rx: GrantReceiver<S>,
        timeout: Option<Duration>,
    ) -> PoolResult<Arc<S>> {
        trace!(waiter = id, "pool at capacity, queueing acquire");

        let started = Instant::now();
        let mut pending = PendingAcquire {
            inner: self,
            id,
            rx,
            settled: false,
        };

        let grant = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut pending.rx).await {
                Ok(received) => received.ok(),
                Err(_) => {
                    if self.state.lock().cancel_waiter(id) {
                        pending.settled = true;
                        let waited = started.elapsed();
                        debug!(waiter = id, waited_ms = waited.as_millis() as u64, "acquire timed out");
                        self.events.emit(&PoolEvent::AcquireTimedOut { waited });
                        return Err(PoolError::Timeout { waited });
                    }
                    // Settled in the same instant the timer fired.
                    pending.rx.try_recv().ok()
                }
            },
            None => (&mut pending.rx).await.ok(),
        };
        pending.settled = true;

        match grant {
            Some(Grant::Session(session)) => {
                self.acquired(&session, true);
                Ok(session)
            }
            Some(Grant::Slot) => self.create_reserved().await,
            None => Err(PoolError::Disposed),
        }
    }

    /// Call the factory for a slot already reserved in the state.
    async fn create_reserved(&self) -> PoolResult<Arc<S>> {
        let max = self.config.max_sessions;
        {
            // A slot granted just before dispose must not reach the factory.
            let mut state = self.state.lock();
            if state.is_disposed() {
                state.abandon_create(max);
                return Err(PoolError::Disposed);
            }
        }

        let mut reservation = Reservation {
            inner: self,
            armed: true,
        };
        let created = self.factory.create().await;
        reservation.armed = false;

        let session = match created {
            Ok(session) => session,
            Err(err) => {
                self.state.lock().abandon_create(max);
                self.metrics.lock().factory_failures += 1;
                debug!(error = %err, "session factory failed");
                return Err(PoolError::Factory(err));
            }
        };

        let recorded = self.state.lock().complete_create(session, max);
        match recorded {
            Ok(session) => {
                self.metrics.lock().sessions_created += 1;
                debug!(session_id = session.session_id(), "session created");
                self.events.emit(&PoolEvent::SessionCreated {
                    session_id: session.session_id().to_string(),
                });
                self.acquired(&session, false);
                Ok(session)
            }
            Err(Rejected::Disposed(session)) => {
                self.teardown(&session, DestroyReason::PoolDisposed).await;
                Err(PoolError::Disposed)
            }
            Err(Rejected::Duplicate(session)) => {
                let session_id = session.session_id().to_string();
                warn!(session_id = %session_id, "factory returned an id that is already tracked");
                self.teardown(&session, DestroyReason::Duplicate).await;
                Err(PoolError::DuplicateSessionId(session_id))
            }
        }
    }

    fn acquired(&self, session: &S, reused: bool) {
        trace!(session_id = session.session_id(), reused, "session acquired");
        self.events.emit(&PoolEvent::SessionAcquired {
            session_id: session.session_id().to_string(),
            reused,
        });
    }

    /// Bookkeeping half of a release; never awaits.
    fn release_tracked(&self, session: &S) -> ReleaseOutcome {
        let session_id = session.session_id();
        let outcome = self.state.lock().release(session_id);

        match outcome {
            ReleaseOutcome::Idled | ReleaseOutcome::HandedOff => {
                let handed_off = outcome == ReleaseOutcome::HandedOff;
                trace!(session_id, handed_off, "session released");
                self.events.emit(&PoolEvent::SessionReleased {
                    session_id: session_id.to_string(),
                    handed_off,
                });
            }
            ReleaseOutcome::Ignored => {
                trace!(session_id, "ignoring release of a session not in use");
            }
            ReleaseOutcome::Disposed => {}
        }
        outcome
    }

    async fn release(&self, session: &S) {
        if self.release_tracked(session) == ReleaseOutcome::Disposed {
            self.teardown(session, DestroyReason::ReleasedAfterDispose)
                .await;
        }
    }

    async fn destroy(&self, session: &S) {
        let removed = self
            .state
            .lock()
            .remove(session.session_id(), self.config.max_sessions);
        if removed.is_none() {
            trace!(
                session_id = session.session_id(),
                "destroying a session the pool does not track"
            );
        }
        drop(removed);

        self.teardown(session, DestroyReason::Explicit).await;
    }

    async fn cleanup_idle(&self) -> usize {
        let evicted = self.state.lock().expire_idle(
            Instant::now(),
            self.config.idle_timeout,
            self.config.min_sessions,
            self.config.max_sessions,
        );

        let count = evicted.len();
        if count == 0 {
            return 0;
        }

        self.metrics.lock().sessions_evicted += count as u64;
        for entry in evicted {
            self.teardown(&entry.session, DestroyReason::IdleTimeout)
                .await;
        }

        debug!(evicted = count, "idle sessions cleaned up");
        count
    }

    async fn dispose(&self) {
        let Some(entries) = self.state.lock().dispose() else {
            return;
        };

        // The cleanup task exits on its next tick. A pass already running
        // still tears down what it evicted.
        info!(sessions = entries.len(), "disposing session pool");

        for entry in entries {
            self.teardown(&entry.session, DestroyReason::PoolDisposed)
                .await;
        }

        self.events.emit(&PoolEvent::Disposed);
        debug!(
            listeners = self.events.listener_count(),
            "dropping event listeners"
        );
        self.events.clear();

        info!("session pool disposed");
    }

    /// Tear a session down, swallowing and counting failures.
    async fn teardown(&self, session: &S, reason: DestroyReason) {
        let session_id = session.session_id();

        let result = session.teardown().await;
        {
            let mut metrics = self.metrics.lock();
            metrics.sessions_destroyed += 1;
            if result.is_err() {
                metrics.teardown_failures += 1;
            }
        }

        match result {
            Ok(()) => debug!(session_id, ?reason, "session torn down"),
            Err(err) => warn!(session_id, ?reason, error = %err, "session teardown failed"),
        }

        self.events.emit(&PoolEvent::SessionDestroyed {
            session_id: session_id.to_string(),
            reason,
        });
    }
}

impl<S: PoolableSession> Drop for PoolInner<S> {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.get_mut().take() {
            task.abort();
        }

        // Dropped without dispose(): sessions would otherwise leak.
        let leftovers = self.state.get_mut().dispose().unwrap_or_default();
        if leftovers.is_empty() {
            return;
        }

        warn!(
            sessions = leftovers.len(),
            "session pool dropped without dispose, tearing down remaining sessions"
        );
        for entry in leftovers {
            spawn_detached_teardown(entry.session);
        }
    }
}

/// A queued acquire. Dropping it before it settles removes the waiter, and
/// returns anything handed to it in the meantime.
struct PendingAcquire<'a, S: PoolableSession> {
    inner: &'a PoolInner<S>,
    id: u64,
    rx: GrantReceiver<S>,
    settled: bool,
}

impl<S: PoolableSession> Drop for PendingAcquire<'_, S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let orphan = {
            let mut state = self.inner.state.lock();
            if state.cancel_waiter(self.id) {
                return;
            }
            match self.rx.try_recv() {
                Ok(Grant::Session(session)) => Some(session),
                Ok(Grant::Slot) => {
                    state.abandon_create(self.inner.config.max_sessions);
                    None
                }
                Err(_) => None,
            }
        };

        if let Some(session) = orphan {
            if self.inner.release_tracked(&session) == ReleaseOutcome::Disposed {
                spawn_detached_teardown(session);
            }
        }
    }
}

/// A reserved creation slot, given back if the factory call is cancelled.
struct Reservation<'a, S: PoolableSession> {
    inner: &'a PoolInner<S>,
    armed: bool,
}

impl<S: PoolableSession> Drop for Reservation<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.inner
                .state
                .lock()
                .abandon_create(self.inner.config.max_sessions);
        }
    }
}

fn spawn_cleanup_task<S: PoolableSession>(inner: &Arc<PoolInner<S>>) -> Option<JoinHandle<()>> {
    if !inner.config.cleanup_enabled() {
        return None;
    }

    let Ok(runtime) = Handle::try_current() else {
        warn!("no Tokio runtime at pool construction, background idle cleanup disabled");
        return None;
    };

    let period = inner.config.cleanup_interval;
    let Some(first_tick) = Instant::now().checked_add(period) else {
        warn!(
            cleanup_interval_secs = period.as_secs(),
            "cleanup interval out of range, background idle cleanup disabled"
        );
        return None;
    };
    let pool = Arc::downgrade(inner);

    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(inner) = pool.upgrade() else {
                break;
            };
            if inner.state.lock().is_disposed() {
                break;
            }
            inner.cleanup_idle().await;
        }
    }))
}

/// Best-effort teardown for paths that cannot await.
fn spawn_detached_teardown<S: PoolableSession>(session: Arc<S>) {
    match Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(err) = session.teardown().await {
                    warn!(
                        session_id = session.session_id(),
                        error = %err,
                        "session teardown failed"
                    );
                }
            });
        }
        Err(_) => {
            warn!(
                session_id = session.session_id(),
                "no Tokio runtime available, session teardown skipped"
            );
        }
    }
}

/// Builder for creating a session pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = PoolBuilder::new()
///     .max_sessions(4)
///     .min_sessions(1)
///     .idle_timeout(Duration::from_secs(120))
///     .build(|| async { AgentSession::spawn().await })?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoolBuilder {
    pool_config: PoolConfig,
}

impl PoolBuilder {
    /// Create a new pool builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the maximum number of sessions.
    #[must_use]
    pub fn max_sessions(mut self, count: usize) -> Self {
        self.pool_config.max_sessions = count;
        self
    }

    /// Set the minimum number of sessions kept warm.
    #[must_use]
    pub fn min_sessions(mut self, count: usize) -> Self {
        self.pool_config.min_sessions = count;
        self
    }

    /// Set the idle session timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.idle_timeout = timeout;
        self
    }

    /// Set the background cleanup interval. Zero disables it.
    #[must_use]
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.pool_config.cleanup_interval = interval;
        self
    }

    /// Set the default acquire timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.acquire_timeout = Some(timeout);
        self
    }

    /// Build the pool.
    pub fn build<S, F>(self, factory: F) -> PoolResult<SessionPool<S>>
    where
        S: PoolableSession,
        F: SessionFactory<S>,
    {
        SessionPool::new(factory, self.pool_config)
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of tracked sessions (`in_use_sessions + idle_sessions`).
    pub total_sessions: usize,
    /// Number of sessions held by callers.
    pub in_use_sessions: usize,
    /// Number of sessions available for reuse.
    pub idle_sessions: usize,
    /// Number of callers queued for a session.
    pub waiting_requests: usize,
    /// Maximum allowed sessions.
    pub max_sessions: usize,
    /// Configured idle timeout.
    pub idle_timeout: Duration,
}

impl PoolStats {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max_sessions == 0 {
            return 0.0;
        }
        (self.in_use_sessions as f64 / self.max_sessions as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total_sessions >= self.max_sessions
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total sessions created since pool start.
    pub sessions_created: u64,
    /// Total sessions torn down since pool start.
    pub sessions_destroyed: u64,
    /// Sessions evicted by idle cleanup.
    pub sessions_evicted: u64,
    /// Successful acquisitions.
    pub acquires_successful: u64,
    /// Failed acquisitions (timeouts, disposal, factory errors).
    pub acquires_failed: u64,
    /// Acquisitions that gave up waiting.
    pub acquire_timeouts: u64,
    /// Factory calls that failed.
    pub factory_failures: u64,
    /// Teardowns that failed.
    pub teardown_failures: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate acquire success rate (0.0 to 1.0).
    #[must_use]
    pub fn acquire_success_rate(&self) -> f64 {
        let total = self.acquires_successful + self.acquires_failed;
        if total == 0 {
            return 1.0;
        }
        self.acquires_successful as f64 / total as f64
    }

    /// Calculate teardown success rate (0.0 to 1.0).
    #[must_use]
    pub fn teardown_success_rate(&self) -> f64 {
        if self.sessions_destroyed == 0 {
            return 1.0;
        }
        let successful = self
            .sessions_destroyed
            .saturating_sub(self.teardown_failures);
        successful as f64 / self.sessions_destroyed as f64
    }
}

/// A session retrieved from the pool.
///
/// When dropped, the session is automatically released to the pool.
/// Use [`detach()`](PooledSession::detach) to take it out of the guard.
pub struct PooledSession<S: PoolableSession> {
    session: Arc<S>,
    pool: Arc<PoolInner<S>>,
    /// Whether drop should release the session.
    armed: bool,
}

impl<S: PoolableSession> PooledSession<S> {
    fn new(session: Arc<S>, pool: Arc<PoolInner<S>>) -> Self {
        Self {
            session,
            pool,
            armed: true,
        }
    }

    /// Get the session handle.
    #[must_use]
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// Release the session now, awaiting teardown if the pool is disposed.
    pub async fn release(mut self) {
        self.armed = false;
        self.pool.release(&self.session).await;
    }

    /// Remove the session from the pool and tear it down.
    pub async fn destroy(mut self) {
        self.armed = false;
        self.pool.destroy(&self.session).await;
    }

    /// Detach the session from the guard.
    ///
    /// The pool still counts the session as in use; hand it back later with
    /// [`SessionPool::release`] or [`SessionPool::destroy`].
    pub fn detach(mut self) -> Arc<S> {
        self.armed = false;
        Arc::clone(&self.session)
    }
}

impl<S: PoolableSession> Deref for PooledSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: PoolableSession> std::fmt::Debug for PooledSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("session_id", &self.session.session_id())
            .finish()
    }
}

impl<S: PoolableSession> Drop for PooledSession<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        trace!(
            session_id = self.session.session_id(),
            "returning session to pool"
        );
        if self.pool.release_tracked(&self.session) == ReleaseOutcome::Disposed {
            spawn_detached_teardown(Arc::clone(&self.session));
        }
    }
}
