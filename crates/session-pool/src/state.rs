//! Lock-protected pool bookkeeping.
//!
//! Every admission and ownership decision is a method on [`PoolState`] and
//! runs inside one critical section of the pool's mutex. Nothing here
//! awaits: factory calls and teardowns happen in `pool.rs` after the lock is
//! released.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::lifecycle::{PoolableSession, SessionMetadata, SessionState};

/// What a queued waiter is woken with.
///
/// A closed channel (sender dropped without sending) means the pool was
/// disposed.
pub(crate) enum Grant<S> {
    /// A released session, already marked in use for the waiter.
    Session(Arc<S>),
    /// A reserved slot; the waiter must call the factory itself.
    Slot,
}

pub(crate) type GrantReceiver<S> = oneshot::Receiver<Grant<S>>;

struct Waiter<S> {
    id: u64,
    tx: oneshot::Sender<Grant<S>>,
}

pub(crate) struct Entry<S> {
    pub(crate) session: Arc<S>,
    state: SessionState,
    created_at: Instant,
    last_released_at: Option<Instant>,
    acquire_count: u64,
}

impl<S: PoolableSession> Entry<S> {
    fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            id: self.session.session_id().to_string(),
            state: self.state,
            created_at: self.created_at,
            last_released_at: self.last_released_at,
            acquire_count: self.acquire_count,
        }
    }
}

/// Result of the admission decision in `acquire`.
pub(crate) enum Admission<S> {
    /// An idle session was taken.
    Reused(Arc<S>),
    /// A slot was reserved for a factory call.
    Create,
    /// The caller was queued.
    Wait(u64, GrantReceiver<S>),
    /// The pool is disposed.
    Disposed,
}

/// Result of recording a freshly created session.
pub(crate) enum Rejected<S> {
    Disposed(S),
    Duplicate(S),
}

/// Result of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// Not a tracked in-use session.
    Ignored,
    /// Marked idle.
    Idled,
    /// Passed directly to the earliest waiter.
    HandedOff,
    /// The pool is disposed; the caller must tear the session down.
    Disposed,
}

pub(crate) struct PoolState<S> {
    entries: HashMap<String, Entry<S>>,
    waiters: VecDeque<Waiter<S>>,
    /// Factory calls in flight, counted against `max_sessions`.
    reserved: usize,
    disposed: bool,
    next_waiter_id: u64,
}

impl<S: PoolableSession> PoolState<S> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            waiters: VecDeque::new(),
            reserved: 0,
            disposed: false,
            next_waiter_id: 0,
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn has_capacity(&self, max: usize) -> bool {
        self.entries.len() + self.reserved < max
    }

    /// Take the longest-idle session, if any.
    pub(crate) fn take_idle(&mut self) -> Option<Arc<S>> {
        let entry = self
            .entries
            .values_mut()
            .filter(|entry| entry.state.is_idle())
            .min_by_key(|entry| entry.last_released_at)?;

        entry.state = SessionState::InUse;
        entry.last_released_at = None;
        entry.acquire_count += 1;
        Some(Arc::clone(&entry.session))
    }

    pub(crate) fn admit(&mut self, max: usize) -> Admission<S> {
        if self.disposed {
            return Admission::Disposed;
        }

        if let Some(session) = self.take_idle() {
            return Admission::Reused(session);
        }

        if self.has_capacity(max) {
            self.reserved += 1;
            return Admission::Create;
        }

        let (tx, rx) = oneshot::channel();
        let id = self.next_waiter_id;
        self.next_waiter_id += 1;
        self.waiters.push_back(Waiter { id, tx });
        Admission::Wait(id, rx)
    }

    /// Turn a reservation into a tracked in-use entry.
    pub(crate) fn complete_create(&mut self, session: S, max: usize) -> Result<Arc<S>, Rejected<S>> {
        self.reserved = self.reserved.saturating_sub(1);

        if self.disposed {
            return Err(Rejected::Disposed(session));
        }

        if self.entries.contains_key(session.session_id()) {
            self.grant_freed_capacity(max);
            return Err(Rejected::Duplicate(session));
        }

        let session = Arc::new(session);
        self.entries.insert(
            session.session_id().to_string(),
            Entry {
                session: Arc::clone(&session),
                state: SessionState::InUse,
                created_at: Instant::now(),
                last_released_at: None,
                acquire_count: 1,
            },
        );
        Ok(session)
    }

    /// Give back a reservation whose factory call failed or was cancelled.
    pub(crate) fn abandon_create(&mut self, max: usize) {
        self.reserved = self.reserved.saturating_sub(1);
        self.grant_freed_capacity(max);
    }

    pub(crate) fn release(&mut self, session_id: &str) -> ReleaseOutcome {
        if self.disposed {
            return ReleaseOutcome::Disposed;
        }

        let Some(entry) = self.entries.get_mut(session_id) else {
            return ReleaseOutcome::Ignored;
        };
        if entry.state.is_idle() {
            return ReleaseOutcome::Ignored;
        }

        while let Some(waiter) = self.waiters.pop_front() {
            if waiter
                .tx
                .send(Grant::Session(Arc::clone(&entry.session)))
                .is_ok()
            {
                entry.acquire_count += 1;
                return ReleaseOutcome::HandedOff;
            }
        }

        entry.state = SessionState::Idle;
        entry.last_released_at = Some(Instant::now());
        ReleaseOutcome::Idled
    }

    /// Remove a session in any state, passing the freed slot to a waiter.
    pub(crate) fn remove(&mut self, session_id: &str, max: usize) -> Option<Entry<S>> {
        let entry = self.entries.remove(session_id)?;
        self.grant_freed_capacity(max);
        Some(entry)
    }

    /// Hand each free slot to the earliest live waiter as a creation grant.
    fn grant_freed_capacity(&mut self, max: usize) {
        while !self.disposed && self.has_capacity(max) {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            self.reserved += 1;
            if waiter.tx.send(Grant::Slot).is_err() {
                self.reserved -= 1;
            }
        }
    }

    /// Remove a still-queued waiter. Returns false if it was already settled.
    pub(crate) fn cancel_waiter(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|waiter| waiter.id == id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Evict idle sessions older than `idle_timeout`, oldest first, never
    /// going below `min_sessions` tracked sessions.
    pub(crate) fn expire_idle(
        &mut self,
        now: Instant,
        idle_timeout: Duration,
        min_sessions: usize,
        max: usize,
    ) -> Vec<Entry<S>> {
        let mut expired: Vec<(Instant, String)> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| match (entry.state, entry.last_released_at) {
                (SessionState::Idle, Some(released))
                    if now.saturating_duration_since(released) > idle_timeout =>
                {
                    Some((released, id.clone()))
                }
                _ => None,
            })
            .collect();
        expired.sort();

        let mut evicted = Vec::new();
        for (_, id) in expired {
            if self.entries.len() <= min_sessions {
                break;
            }
            if let Some(entry) = self.entries.remove(&id) {
                evicted.push(entry);
            }
        }

        if !evicted.is_empty() {
            self.grant_freed_capacity(max);
        }
        evicted
    }

    /// Mark disposed, drop every waiter and hand back all tracked entries.
    ///
    /// Returns `None` if the pool was already disposed.
    pub(crate) fn dispose(&mut self) -> Option<Vec<Entry<S>>> {
        if self.disposed {
            return None;
        }
        self.disposed = true;
        // Dropping the senders wakes every waiter with a closed channel.
        self.waiters.clear();
        Some(self.entries.drain().map(|(_, entry)| entry).collect())
    }

    pub(crate) fn total(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn idle(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state.is_idle())
            .count()
    }

    pub(crate) fn waiting(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn metadata(&self) -> Vec<SessionMetadata> {
        self.entries.values().map(Entry::metadata).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use async_trait::async_trait;

    struct Fake(String);

    #[async_trait]
    impl PoolableSession for Fake {
        type Request = ();
        type Response = ();

        fn session_id(&self) -> &str {
            &self.0
        }

        async fn request(&self, _request: ()) -> Result<(), BoxError> {
            Ok(())
        }

        async fn teardown(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn fake(id: &str) -> Fake {
        Fake(id.to_string())
    }

    fn create(state: &mut PoolState<Fake>, id: &str, max: usize) -> Arc<Fake> {
        assert!(matches!(state.admit(max), Admission::Create));
        match state.complete_create(fake(id), max) {
            Ok(session) => session,
            Err(_) => panic!("create rejected"),
        }
    }

    #[test]
    fn test_admit_reserves_until_max() {
        let mut state = PoolState::<Fake>::new(2);
        assert!(matches!(state.admit(2), Admission::Create));
        assert!(matches!(state.admit(2), Admission::Create));
        assert!(matches!(state.admit(2), Admission::Wait(..)));
        assert_eq!(state.total(), 0);
        assert_eq!(state.waiting(), 1);
    }

    #[test]
    fn test_release_then_reuse() {
        let mut state = PoolState::new(1);
        let a = create(&mut state, "a", 1);

        assert_eq!(state.release("a"), ReleaseOutcome::Idled);
        assert_eq!(state.idle(), 1);

        match state.admit(1) {
            Admission::Reused(session) => assert_eq!(session.session_id(), a.session_id()),
            _ => panic!("expected reuse"),
        }
        assert_eq!(state.idle(), 0);
    }

    #[test]
    fn test_release_unknown_or_idle_is_ignored() {
        let mut state = PoolState::new(1);
        assert_eq!(state.release("nope"), ReleaseOutcome::Ignored);

        create(&mut state, "a", 1);
        assert_eq!(state.release("a"), ReleaseOutcome::Idled);
        assert_eq!(state.release("a"), ReleaseOutcome::Ignored);
    }

    #[test]
    fn test_release_hands_off_fifo() {
        let mut state = PoolState::new(1);
        create(&mut state, "a", 1);

        let Admission::Wait(_, mut first) = state.admit(1) else {
            panic!("expected wait");
        };
        let Admission::Wait(_, mut second) = state.admit(1) else {
            panic!("expected wait");
        };

        assert_eq!(state.release("a"), ReleaseOutcome::HandedOff);
        assert!(matches!(first.try_recv(), Ok(Grant::Session(_))));
        assert!(second.try_recv().is_err());
        assert_eq!(state.idle(), 0);
        assert_eq!(state.waiting(), 1);
    }

    #[test]
    fn test_release_skips_dropped_waiter() {
        let mut state = PoolState::new(1);
        create(&mut state, "a", 1);

        let Admission::Wait(_, gone) = state.admit(1) else {
            panic!("expected wait");
        };
        drop(gone);

        assert_eq!(state.release("a"), ReleaseOutcome::Idled);
        assert_eq!(state.waiting(), 0);
    }

    #[test]
    fn test_remove_grants_slot_to_waiter() {
        let mut state = PoolState::new(1);
        create(&mut state, "a", 1);

        let Admission::Wait(_, mut waiter) = state.admit(1) else {
            panic!("expected wait");
        };

        assert!(state.remove("a", 1).is_some());
        assert!(matches!(waiter.try_recv(), Ok(Grant::Slot)));
        // The granted slot counts against capacity until the waiter creates.
        assert!(matches!(state.admit(1), Admission::Wait(..)));
    }

    #[test]
    fn test_abandon_create_frees_slot() {
        let mut state = PoolState::<Fake>::new(1);
        assert!(matches!(state.admit(1), Admission::Create));
        state.abandon_create(1);
        assert!(matches!(state.admit(1), Admission::Create));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut state = PoolState::new(2);
        create(&mut state, "a", 2);

        assert!(matches!(state.admit(2), Admission::Create));
        assert!(matches!(
            state.complete_create(fake("a"), 2),
            Err(Rejected::Duplicate(_))
        ));
        assert_eq!(state.total(), 1);
    }

    #[test]
    fn test_expire_respects_floor_and_in_use() {
        let mut state = PoolState::new(5);
        for id in ["a", "b", "c", "d"] {
            create(&mut state, id, 5);
        }
        for id in ["a", "b", "c"] {
            state.release(id);
        }

        let later = Instant::now() + Duration::from_secs(10);
        let evicted = state.expire_idle(later, Duration::from_secs(1), 2, 5);

        assert_eq!(evicted.len(), 2);
        assert_eq!(state.total(), 2);
        // "d" is still in use and must survive.
        assert!(state.metadata().iter().any(|meta| meta.id == "d"));
    }

    #[test]
    fn test_expire_ignores_fresh_sessions() {
        let mut state = PoolState::new(2);
        create(&mut state, "a", 2);
        state.release("a");

        let evicted = state.expire_idle(Instant::now(), Duration::from_secs(60), 0, 2);
        assert!(evicted.is_empty());
    }

    #[test]
    fn test_dispose_closes_waiters_once() {
        let mut state = PoolState::new(1);
        create(&mut state, "a", 1);
        let Admission::Wait(_, mut waiter) = state.admit(1) else {
            panic!("expected wait");
        };

        let entries = state.dispose().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(waiter.try_recv().is_err());
        assert!(state.dispose().is_none());
        assert!(matches!(state.admit(1), Admission::Disposed));
        assert_eq!(state.release("a"), ReleaseOutcome::Disposed);
    }
}
