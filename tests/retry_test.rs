//! Tests for [`with_retry`] timing and attempt bounds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use huginn::{HuginnError, Result, RetryConfig, with_retry};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn default_policy_makes_three_attempts_in_1500ms() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result: Result<()> = with_retry(&RetryConfig::default(), "test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(HuginnError::Http("boom".into()))
    })
    .await;

    let elapsed = start.elapsed();
    assert!(matches!(result, Err(HuginnError::Http(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(elapsed >= Duration::from_millis(1500), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1600), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn success_stops_retrying() {
    let calls = AtomicU32::new(0);

    let result = with_retry(&RetryConfig::default(), "test", || async {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 2 {
            Err(HuginnError::Http("flaky".into()))
        } else {
            Ok(n)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn disabled_policy_tries_once_without_sleeping() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result: Result<()> = with_retry(&RetryConfig::disabled(), "test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(HuginnError::NoServerFound)
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn delays_respect_max_delay() {
    let config = RetryConfig::new()
        .max_retries(3)
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_millis(150));
    let start = Instant::now();

    let result: Result<()> = with_retry(&config, "test", || async {
        Err(HuginnError::Http("boom".into()))
    })
    .await;

    // 100 + 150 + 150
    assert!(result.is_err());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
}
