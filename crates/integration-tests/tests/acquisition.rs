//! Acquisition state machine: single-flight, validation retry, error sharing
//!
//! Runs on paused tokio time, so the fixed 10s retry delay costs nothing.

use futures::future::join_all;
use reshandler_core::application::constants::RESOURCE_RETRY_DELAY;
use reshandler_core::port::mocks::{MockOptions, MockResource, MockResourceOwner};
use reshandler_core::{ErrorKind, HandlerError, ResourceHandler};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

fn handler(owner: &MockResourceOwner) -> ResourceHandler<MockResourceOwner> {
    ResourceHandler::new(owner.clone(), MockOptions::default())
}

/// N concurrent acquisitions on an empty handler -> one acquire call
#[tokio::test(start_paused = true)]
async fn test_concurrent_acquisition_acquires_once() {
    let owner = MockResourceOwner::new().with_acquire_delay(Duration::from_millis(200));
    let handler = handler(&owner);

    let results = join_all((0..10).map(|_| handler.get_hold_of_resource())).await;

    assert_eq!(owner.acquire_calls(), 1);
    for result in results {
        assert_eq!(result, Ok(MockResource { id: 1 }));
    }
}

/// Concurrent operation jobs share the acquisition too
#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_acquire_once() {
    let owner = MockResourceOwner::new().with_acquire_delay(Duration::from_millis(200));
    let handler = handler(&owner);

    let results = join_all((0..25).map(|i| handler.call("ping", json!([i])))).await;

    assert_eq!(owner.acquire_calls(), 1);
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(owner.invocations().len(), 25);
}

/// K unusable candidates -> K destroys and >= K x 10s before the resource is ready
#[tokio::test(start_paused = true)]
async fn test_retry_backoff_after_failed_validation() {
    const K: u32 = 3;
    let owner = MockResourceOwner::with_script([false, false, false]);
    let handler = handler(&owner);

    let start = Instant::now();
    let resource = handler.get_hold_of_resource().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(resource, MockResource { id: K + 1 });
    assert_eq!(owner.destroyed(), vec![1, 2, 3]);
    assert_eq!(owner.acquire_calls(), (K + 1) as usize);
    assert!(elapsed >= RESOURCE_RETRY_DELAY * K, "elapsed {elapsed:?}");
    assert!(elapsed < RESOURCE_RETRY_DELAY * (K + 1), "elapsed {elapsed:?}");
}

/// R1 unusable, R2 usable -> method runs with R2, R1 destroyed, >= 10s
#[tokio::test(start_paused = true)]
async fn test_unusable_first_resource_is_replaced() {
    let owner = MockResourceOwner::with_script([false, true]);
    let handler = handler(&owner);

    let start = Instant::now();
    let out = handler.call("ping", json!([])).await.unwrap();

    assert_eq!(out["resource"], json!(2));
    assert_eq!(owner.destroyed(), vec![1]);
    assert!(start.elapsed() >= Duration::from_secs(10));
}

/// A held resource that went stale is destroyed, cleared and re-acquired
#[tokio::test(start_paused = true)]
async fn test_stale_held_resource_is_replaced() {
    let owner = MockResourceOwner::new();
    let handler = handler(&owner);

    handler.call("ping", json!([])).await.unwrap();
    owner.mark_stale(1);

    let start = Instant::now();
    let out = handler.call("ping", json!([])).await.unwrap();

    assert_eq!(out["resource"], json!(2));
    assert_eq!(owner.destroyed(), vec![1]);
    assert_eq!(owner.acquire_calls(), 2);
    assert!(start.elapsed() >= RESOURCE_RETRY_DELAY);
}

/// Every method invocation sees a resource that was usable when committed
#[tokio::test(start_paused = true)]
async fn test_invoked_resources_are_always_valid() {
    let owner = MockResourceOwner::with_script([false, true, false, true]);
    let handler = handler(&owner);

    for round in 0..6 {
        if round == 3 {
            owner.mark_stale(2);
        }
        handler.call("ping", json!([round])).await.unwrap();
    }

    let invocations = owner.invocations();
    assert_eq!(invocations.len(), 6);
    assert!(invocations.iter().all(|i| i.usable));
    assert_eq!(owner.destroyed(), vec![1, 2, 3]);
}

/// An acquire error reaches every caller waiting on that acquisition
#[tokio::test(start_paused = true)]
async fn test_acquisition_error_is_shared_and_not_retried() {
    let owner = MockResourceOwner::new().with_acquire_delay(Duration::from_millis(100));
    owner.fail_acquire("connection refused");
    let handler = handler(&owner);

    let results = join_all((0..5).map(|_| handler.call("ping", json!([])))).await;

    assert_eq!(owner.acquire_calls(), 1);
    for result in results {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AcquisitionFailed);
        assert_eq!(err, HandlerError::Acquisition("connection refused".into()));
    }
    assert!(owner.invocations().is_empty());
    assert!(!handler.has_resource().await);
}

/// After a failed acquisition the next call starts a fresh one
#[tokio::test(start_paused = true)]
async fn test_next_call_after_failure_acquires_again() {
    let owner = MockResourceOwner::new();
    owner.fail_acquire("timeout");
    let handler = handler(&owner);

    assert!(handler.call("ping", json!([])).await.is_err());
    assert!(handler.call("ping", json!([])).await.is_err());
    assert_eq!(owner.acquire_calls(), 2);
}
