//! Dropped acquire futures must not leak waiters, slots or sessions.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use session_pool::PoolableSession;
use session_pool_testing::{MockFactory, MockPool, manual_cleanup_config, wait_for_waiters};

#[tokio::test(start_paused = true)]
async fn dropped_waiter_leaves_queue() {
    let pool = MockPool::new(
        MockFactory::new("agent"),
        manual_cleanup_config().max_sessions(1),
    )
    .unwrap();
    let held = pool.acquire().await.unwrap();

    let outer = tokio::time::timeout(Duration::from_millis(10), pool.acquire()).await;
    assert!(outer.is_err());
    assert_eq!(pool.stats().waiting_requests, 0);

    pool.release(&held).await;
    assert_eq!(pool.stats().idle_sessions, 1);
}

#[tokio::test(start_paused = true)]
async fn aborted_creation_frees_reservation() {
    let factory = MockFactory::new("agent");
    factory.set_delay(Some(Duration::from_secs(60)));
    let pool = MockPool::new(factory.clone(), manual_cleanup_config().max_sessions(1)).unwrap();

    let stuck = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await }
    });
    tokio::task::yield_now().await;

    stuck.abort();
    assert!(stuck.await.unwrap_err().is_cancelled());

    factory.set_delay(None);
    let session = pool
        .acquire_timeout(Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(session.teardown_count(), 0);
    assert_eq!(pool.stats().total_sessions, 1);
}

#[tokio::test]
async fn session_handed_to_cancelled_waiter_is_returned() {
    let pool = MockPool::new(
        MockFactory::new("agent"),
        manual_cleanup_config().max_sessions(1),
    )
    .unwrap();
    let held = pool.acquire().await.unwrap();

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await }
    });
    wait_for_waiters(&pool, 1).await;

    // Hand off, then cancel the waiter before it can observe the grant.
    pool.release(&held).await;
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());

    let stats = pool.stats();
    assert_eq!(stats.in_use_sessions, 0);
    assert_eq!(stats.idle_sessions, 1);

    let again = pool
        .acquire_timeout(Duration::from_millis(10))
        .await
        .unwrap();
    assert!(std::sync::Arc::ptr_eq(&again, &held));
}

#[tokio::test(start_paused = true)]
async fn slot_granted_to_cancelled_waiter_is_returned() {
    let factory = MockFactory::new("agent");
    let pool = MockPool::new(factory.clone(), manual_cleanup_config().max_sessions(1)).unwrap();
    let held = pool.acquire().await.unwrap();

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await }
    });
    wait_for_waiters(&pool, 1).await;

    pool.destroy(&held).await;
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());

    let fresh = pool
        .acquire_timeout(Duration::from_millis(10))
        .await
        .unwrap();
    assert_ne!(fresh.session_id(), held.session_id());
    assert_eq!(pool.stats().total_sessions, 1);
}
