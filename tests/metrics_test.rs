//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use huginn::telemetry;
use huginn::{
    CacheConfig, HuginnError, ModelSource, ModelStatusCache, ModelValidator,
    OpenAiCompatibleClient, Result, RetryConfig, with_retry,
};

const BASE: &str = "http://127.0.0.1:1234";

// ============================================================================
// Mock source
// ============================================================================

struct StaticSource(Vec<String>);

#[async_trait]
impl ModelSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_model_ids(&self, _base_url: &str) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    counter_with_label(snapshot, name, None)
}

/// Sum counter values matching a name and, optionally, one label pair.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| {
            label.is_none_or(|(k, v)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == k && l.value() == v)
            })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Drive `fut` on a fresh current-thread runtime inside a local recorder
/// scope. `paused` starts the runtime with a paused clock.
fn recorded<F: Future>(paused: bool, fut: F) -> (F::Output, SnapshotVec) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let output = metrics::with_local_recorder(&recorder, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(paused)
            .build()
            .unwrap()
            .block_on(fut)
    });
    (output, snapshotter.snapshot().into_vec())
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn cache_hits_and_misses_are_counted() {
    let (_, snapshot) = recorded(true, async {
        let cache = ModelStatusCache::new();
        for _ in 0..3 {
            cache
                .get_models(BASE, || async { Ok(ids(&["qwen3-8b"])) })
                .await
                .unwrap();
        }
    });

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 2);
}

#[test]
fn stale_fallback_and_expiry_are_counted() {
    let (_, snapshot) = recorded(true, async {
        let cache = ModelStatusCache::new();
        let offline = || async {
            Err(HuginnError::Connect {
                url: BASE.into(),
                reason: "refused".into(),
            })
        };

        cache
            .get_models(BASE, || async { Ok(ids(&["qwen3-8b"])) })
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(cache.get_models(BASE, offline).await.is_ok());
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get_models(BASE, offline).await.is_err());
    });

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_STALE_SERVED_TOTAL), 1);
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::CACHE_EVICTIONS_TOTAL,
            Some(("reason", "expired_fallback"))
        ),
        1
    );
}

#[test]
fn capacity_evictions_are_counted() {
    let (_, snapshot) = recorded(true, async {
        let cache = ModelStatusCache::with_config(CacheConfig::new().max_entries(1));
        for base in ["http://a:1234", "http://b:1234", "http://c:1234"] {
            cache
                .get_models(base, || async { Ok(ids(&["m"])) })
                .await
                .unwrap();
            tokio::time::advance(Duration::from_millis(10)).await;
        }
    });

    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::CACHE_EVICTIONS_TOTAL,
            Some(("reason", "capacity"))
        ),
        2
    );
}

#[test]
fn retries_are_counted_per_operation() {
    let (result, snapshot) = recorded(true, async {
        with_retry(&RetryConfig::default(), "probe", || async {
            Err::<(), _>(HuginnError::Http("boom".into()))
        })
        .await
    });

    assert!(result.is_err());
    assert_eq!(
        counter_with_label(&snapshot, telemetry::RETRIES_TOTAL, Some(("operation", "probe"))),
        2
    );
}

#[test]
fn validation_outcomes_are_counted() {
    let (_, snapshot) = recorded(true, async {
        let validator = ModelValidator::new(
            Arc::new(ModelStatusCache::new()),
            Arc::new(StaticSource(ids(&["qwen3-8b"]))),
        )
        .retry(RetryConfig::disabled());

        assert!(validator.validate("qwen3-8b", BASE).await.is_success());
        assert!(!validator.validate("gpt-4", BASE).await.is_success());
    });

    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::VALIDATIONS_TOTAL,
            Some(("outcome", "success"))
        ),
        1
    );
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::VALIDATIONS_TOTAL,
            Some(("outcome", "failure"))
        ),
        1
    );
}

#[test]
fn fetches_are_counted_by_status() {
    let (_, snapshot) = recorded(false, async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;
        let client = OpenAiCompatibleClient::new().unwrap();

        client.fetch_model_ids(&server.uri()).await.unwrap();
        client
            .fetch_model_ids(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
    });

    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, Some(("status", "ok"))),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, Some(("status", "error"))),
        1
    );
}
