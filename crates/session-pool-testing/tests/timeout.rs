//! Acquire timeouts.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use session_pool::{PoolError, PoolEvent};
use session_pool_testing::{MockFactory, MockPool, manual_cleanup_config, wait_for_waiters};

#[tokio::test(start_paused = true)]
async fn waiter_times_out_and_leaves_queue() {
    let pool = MockPool::new(
        MockFactory::new("agent"),
        manual_cleanup_config().max_sessions(1),
    )
    .unwrap();
    let _held = pool.acquire().await.unwrap();

    let started = tokio::time::Instant::now();
    let err = pool
        .acquire_timeout(Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    match err {
        PoolError::Timeout { waited } => assert!(waited >= Duration::from_millis(100)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(pool.stats().waiting_requests, 0);

    let metrics = pool.metrics();
    assert_eq!(metrics.acquire_timeouts, 1);
    assert_eq!(metrics.acquires_failed, 1);
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_applies_to_acquire() {
    let pool = MockPool::new(
        MockFactory::new("agent"),
        manual_cleanup_config()
            .max_sessions(1)
            .acquire_timeout(Some(Duration::from_millis(30))),
    )
    .unwrap();
    let _held = pool.acquire().await.unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn release_after_timeout_goes_idle() {
    let pool = MockPool::new(
        MockFactory::new("agent"),
        manual_cleanup_config().max_sessions(1),
    )
    .unwrap();
    let held = pool.acquire().await.unwrap();

    assert!(
        pool.acquire_timeout(Duration::from_millis(10))
            .await
            .is_err()
    );

    pool.release(&held).await;
    let stats = pool.stats();
    assert_eq!(stats.idle_sessions, 1);
    assert_eq!(stats.in_use_sessions, 0);
}

#[tokio::test(start_paused = true)]
async fn timed_out_waiter_does_not_block_later_waiters() {
    let pool = MockPool::new(
        MockFactory::new("agent"),
        manual_cleanup_config().max_sessions(1),
    )
    .unwrap();
    let held = pool.acquire().await.unwrap();

    let impatient = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire_timeout(Duration::from_millis(10)).await }
    });
    wait_for_waiters(&pool, 1).await;

    let patient = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await }
    });
    wait_for_waiters(&pool, 2).await;

    assert!(impatient.await.unwrap().unwrap_err().is_timeout());
    assert_eq!(pool.stats().waiting_requests, 1);

    pool.release(&held).await;
    let session = patient.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&session, &held));
}

#[tokio::test(start_paused = true)]
async fn timeout_emits_event() {
    let pool = MockPool::new(
        MockFactory::new("agent"),
        manual_cleanup_config().max_sessions(1),
    )
    .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let _sub = pool.subscribe({
        let seen = Arc::clone(&seen);
        move |event| {
            if let PoolEvent::AcquireTimedOut { waited } = event {
                seen.lock().push(*waited);
            }
        }
    });

    let _held = pool.acquire().await.unwrap();
    let _ = pool.acquire_timeout(Duration::from_millis(40)).await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0] >= Duration::from_millis(40));
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_fails_fast_at_capacity() {
    let pool = MockPool::new(
        MockFactory::new("agent"),
        manual_cleanup_config().max_sessions(1),
    )
    .unwrap();
    let _held = pool.acquire().await.unwrap();

    let err = pool.acquire_timeout(Duration::ZERO).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(pool.stats().waiting_requests, 0);
}
