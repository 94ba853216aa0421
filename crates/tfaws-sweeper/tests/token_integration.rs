//! Change-token serialization against a fake token service

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tfaws_sweeper::{ChangeTokenRetryer, KeyedMutex, RetryError, RetryPolicy};
use tfaws_test_utils::{ConcurrencyProbe, FakeTokenServer, init_tracing};
use tokio_util::sync::CancellationToken;

fn retryer() -> ChangeTokenRetryer {
    ChangeTokenRetryer::new(KeyedMutex::new()).with_policy(
        RetryPolicy::with_timeout(Duration::from_secs(60)).poll_interval(Duration::from_millis(50)),
    )
}

/// Fetch a token, hold the critical section for a while, then consume it.
async fn update_rule(
    retryer: ChangeTokenRetryer,
    key: String,
    server: Arc<FakeTokenServer>,
    probe: Arc<ConcurrencyProbe>,
) -> Result<(), RetryError> {
    retryer
        .run_with_token(
            &key,
            || {
                let token = server.issue();
                async move { anyhow::Ok(token) }
            },
            |token: String| {
                let server = Arc::clone(&server);
                let probe = Arc::clone(&probe);
                async move {
                    probe.hold(Duration::from_millis(100)).await;
                    server.consume(&token)?;
                    anyhow::Ok(())
                }
            },
        )
        .await
}

#[tokio::test(start_paused = true)]
async fn test_same_key_is_serialized() {
    init_tracing();

    let retryer = retryer();
    let server = FakeTokenServer::new();
    let probe = ConcurrencyProbe::new();

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            tokio::spawn(update_rule(
                retryer.clone(),
                "us-west-2".to_string(),
                Arc::clone(&server),
                Arc::clone(&probe),
            ))
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(probe.max(), 1);
    assert_eq!(probe.entries(), 10);
    // Serialized callers never invalidate each other's tokens
    assert_eq!(server.issued(), 10);
    assert_eq!(server.consumed(), 10);
    assert_eq!(server.stale_rejections(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_different_keys_run_in_parallel() {
    init_tracing();

    let retryer = retryer();
    let probe = ConcurrencyProbe::new();

    let tasks: Vec<_> = ["us-east-1", "eu-west-1", "ap-southeast-2"]
        .into_iter()
        .map(|region| {
            tokio::spawn(update_rule(
                retryer.clone(),
                region.to_string(),
                FakeTokenServer::new(),
                Arc::clone(&probe),
            ))
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(probe.max(), 3);
    assert_eq!(retryer.locks().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_external_interference_is_absorbed() {
    init_tracing();

    let retryer = retryer();
    let server = FakeTokenServer::new();
    let interfered = AtomicBool::new(false);

    let result = retryer
        .run_with_token(
            "us-west-2",
            || {
                let token = server.issue();
                async move { anyhow::Ok(token) }
            },
            |token: String| {
                // Another process grabs a token between our fetch and our call
                if !interfered.swap(true, Ordering::SeqCst) {
                    server.interfere();
                }
                let result = server.consume(&token);
                async move { anyhow::Ok(result?) }
            },
        )
        .await;

    result.unwrap();
    assert_eq!(server.stale_rejections(), 1);
    assert_eq!(server.consumed(), 1);
    // Ours, the interfering one, then ours again
    assert_eq!(server.issued(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_lock_is_released_after_timeout() {
    init_tracing();

    let retryer = ChangeTokenRetryer::new(KeyedMutex::new()).with_policy(
        RetryPolicy::with_timeout(Duration::from_secs(1)).poll_interval(Duration::from_millis(200)),
    );
    let server = FakeTokenServer::new();

    // Every call is raced by another writer
    let err = retryer
        .run_with_token(
            "us-west-2",
            || {
                let token = server.issue();
                async move { anyhow::Ok(token) }
            },
            |token: String| {
                server.interfere();
                let result = server.consume(&token);
                async move { anyhow::Ok(result?) }
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("WAFStaleDataException"));

    // The key is free again
    let probe = ConcurrencyProbe::new();
    update_rule(retryer.clone(), "us-west-2".to_string(), FakeTokenServer::new(), probe)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff_releases_lock() {
    init_tracing();

    let cancel = CancellationToken::new();
    let retryer = ChangeTokenRetryer::new(KeyedMutex::new())
        .with_policy(
            RetryPolicy::with_timeout(Duration::from_secs(60)).poll_interval(Duration::from_secs(1)),
        )
        .with_cancellation(cancel.clone());
    let server = FakeTokenServer::new();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            cancel.cancel();
        }
    });

    let start = tokio::time::Instant::now();
    let err = retryer
        .run_with_token(
            "eu-west-1",
            || {
                let token = server.issue();
                async move { anyhow::Ok(token) }
            },
            |token: String| {
                server.interfere();
                let result = server.consume(&token);
                async move { anyhow::Ok(result?) }
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(matches!(err, RetryError::Cancelled { attempts: 3, .. }));
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(server.consumed(), 0);
    assert_eq!(server.stale_rejections(), 3);

    // Nobody else holds the key, so the lock is immediately available
    let guard = tokio::time::timeout(Duration::from_millis(10), retryer.locks().lock("eu-west-1"))
        .await
        .expect("lock should be free after cancellation");
    drop(guard);
}
