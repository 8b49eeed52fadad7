//! Lifecycle event subscriptions.
//!
//! Listeners are registered with [`SessionPool::subscribe`](crate::SessionPool::subscribe)
//! and stay registered for as long as the returned [`Subscription`] is alive.
//! Events are delivered synchronously on the task that caused them, never
//! while the pool's internal lock is held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;

/// Why a session left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    /// A caller destroyed it.
    Explicit,
    /// Idle cleanup evicted it.
    IdleTimeout,
    /// The pool was disposed while it was tracked.
    PoolDisposed,
    /// It was released after the pool had been disposed.
    ReleasedAfterDispose,
    /// The factory returned an id the pool already tracks.
    Duplicate,
}

/// Events emitted by a session pool.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolEvent {
    /// The factory produced a new session.
    SessionCreated {
        /// Session identifier.
        session_id: String,
    },
    /// A session was handed to a caller.
    SessionAcquired {
        /// Session identifier.
        session_id: String,
        /// Whether it was reused rather than freshly created.
        reused: bool,
    },
    /// A session was released back to the pool.
    SessionReleased {
        /// Session identifier.
        session_id: String,
        /// Whether it went straight to a waiting caller.
        handed_off: bool,
    },
    /// A session was torn down and removed.
    SessionDestroyed {
        /// Session identifier.
        session_id: String,
        /// Why it was removed.
        reason: DestroyReason,
    },
    /// A queued acquire gave up waiting.
    AcquireTimedOut {
        /// How long the caller waited.
        waited: Duration,
    },
    /// The pool was disposed.
    Disposed,
}

type Listener = Arc<dyn Fn(&PoolEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(u64, Listener)>>,
}

/// Fan-out of pool events to registered listeners.
#[derive(Default)]
pub(crate) struct EventHub {
    registry: Arc<Registry>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PoolEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .write()
            .push((id, Arc::new(listener)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub(crate) fn emit(&self, event: &PoolEvent) {
        // Snapshot so listeners may (un)subscribe from inside a callback.
        let listeners: Vec<Listener> = {
            let guard = self.registry.listeners.read();
            if guard.is_empty() {
                return;
            }
            guard.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        for listener in listeners {
            listener(event);
        }
    }

    pub(crate) fn clear(&self) {
        self.registry.listeners.write().clear();
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.registry.listeners.read().len()
    }
}

/// Handle keeping a listener registered.
///
/// Dropping the handle unsubscribes. Outliving the pool is harmless.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.listeners.write().retain(|(id, _)| *id != self.id);
        }
    }
}
