//! End-to-end tests for the [`Huginn`] facade and its host hooks against a
//! mock inference server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use huginn::{CacheConfig, ErrorCategory, HostConfig, Huginn, HuginnConfig, HuginnError};

async fn lm_studio(models: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    let data: Vec<_> = models
        .iter()
        .map(|id| json!({ "id": id, "object": "model", "owned_by": "organization_owner" }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "object": "list", "data": data })))
        .mount(&server)
        .await;
    server
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn host_with_base_url(base_url: Option<&str>) -> HostConfig {
    let mut options = serde_json::Map::new();
    if let Some(url) = base_url {
        options.insert("baseURL".into(), json!(url));
    }
    HostConfig::from_json(
        &json!({
            "provider": {
                "lmstudio": {
                    "npm": "@ai-sdk/openai-compatible",
                    "options": options,
                    "models": { "qwen3-8b": { "name": "My Qwen" } }
                },
                "anthropic": { "options": { "apiKey": "sk-ant-test" } }
            }
        })
        .to_string(),
    )
    .unwrap()
}

// =============================================================================
// Builder
// =============================================================================

#[test]
fn builder_rejects_invalid_config() {
    let mut config = HuginnConfig::default();
    config.cache = CacheConfig::new().max_entries(0);

    let result = Huginn::builder().config(config).build();
    assert!(matches!(result, Err(HuginnError::Configuration(_))));
}

#[test]
fn builder_applies_config() {
    let mut config = HuginnConfig::default();
    config.cache = CacheConfig::new().ttl(Duration::from_secs(42));

    let huginn = Huginn::builder()
        .config(config)
        .base_url("http://127.0.0.1:1234/v1")
        .build()
        .unwrap();

    assert_eq!(huginn.cache().config().ttl, Duration::from_secs(42));
    assert_eq!(
        huginn.config().server.base_url.as_deref(),
        Some("http://127.0.0.1:1234/v1")
    );
}

// =============================================================================
// Config hook
// =============================================================================

#[tokio::test]
async fn on_config_merges_loaded_models() {
    let server = lm_studio(&["qwen3-8b", "gemma-3-4b"]).await;
    let huginn = Huginn::builder().build().unwrap();
    let mut host = host_with_base_url(Some(&format!("{}/v1", server.uri())));

    let report = huginn.on_config(&mut host).await;

    assert!(report.is_ok());
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.added_models["lmstudio"], vec!["gemma-3-4b"]);
    let lmstudio = &host.provider["lmstudio"];
    assert_eq!(lmstudio.models["qwen3-8b"].name.as_deref(), Some("My Qwen"));
    assert_eq!(lmstudio.models["gemma-3-4b"].name.as_deref(), Some("gemma-3-4b"));
    assert!(host.provider["anthropic"].models.is_empty());
    // the hook warmed the cache
    assert!(huginn.cache().is_valid(&server.uri()));
}

#[tokio::test]
async fn on_config_discovers_missing_base_url() {
    let server = lm_studio(&["qwen3-8b"]).await;
    let mut config = HuginnConfig::default();
    config.server.discovery_ports = vec![closed_port(), server.address().port()];
    let huginn = Huginn::builder().config(config).build().unwrap();
    let mut host = host_with_base_url(None);

    let report = huginn.on_config(&mut host).await;

    assert!(report.is_ok());
    assert_eq!(
        host.provider["lmstudio"].options.base_url,
        Some(format!("{}/v1", server.uri()))
    );
    // nothing new to add, but the missing baseURL is still reported
    assert!(report.added_models.is_empty());
    assert!(report.warnings.iter().any(|w| w.message.contains("auto-discovered")));
}

#[tokio::test]
async fn on_config_without_server_warns_and_leaves_config() {
    let huginn = Huginn::builder().build().unwrap();
    let base = format!("http://127.0.0.1:{}/v1", closed_port());
    let mut host = host_with_base_url(Some(&base));
    let before = host.clone();

    let report = huginn.on_config(&mut host).await;

    assert!(report.is_ok());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].message.contains("could not load models"));
    assert_eq!(host, before);
}

#[tokio::test]
async fn on_config_respects_time_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [{ "id": "late" }] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let mut config = HuginnConfig::default();
    config.validation.config_budget = Duration::from_millis(200);
    let huginn = Huginn::builder().config(config).build().unwrap();
    let mut host = host_with_base_url(Some(&server.uri()));

    let started = std::time::Instant::now();
    let report = huginn.on_config(&mut host).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(report.warnings.iter().any(|w| w.message.contains("timed out")));
    assert!(!host.provider["lmstudio"].models.contains_key("late"));
}

#[tokio::test]
async fn on_config_skips_providers_with_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(0)
        .mount(&server)
        .await;
    let huginn = Huginn::builder().build().unwrap();
    let mut host = host_with_base_url(Some("ftp://127.0.0.1:1234"));

    let report = huginn.on_config(&mut host).await;

    assert!(!report.is_ok());
    assert_eq!(report.errors[0].provider, "lmstudio");
}

// =============================================================================
// Chat hook
// =============================================================================

#[tokio::test]
async fn on_chat_params_accepts_loaded_model() {
    let server = lm_studio(&["qwen3-8b"]).await;
    let huginn = Huginn::builder().build().unwrap();

    let outcome = huginn.on_chat_params("qwen3-8b", &server.uri()).await;

    assert!(outcome.is_success());
    assert_eq!(huginn.stats().size, 1);
}

#[tokio::test]
async fn on_chat_params_reports_unloaded_model() {
    let server = lm_studio(&["qwen/qwen3-30b-chat", "llama-3.2-3b"]).await;
    let mut config = HuginnConfig::default();
    config.retry = config.retry.max_retries(0);
    let huginn = Huginn::builder().config(config).build().unwrap();

    let outcome = huginn
        .on_chat_params("qwen/qwen3-30b-instruct", &format!("{}/v1", server.uri()))
        .await;

    let failure = outcome.failure().expect("failure");
    assert_eq!(failure.error.category, ErrorCategory::Unknown);
    assert_eq!(failure.suggestions[0].model_id, "qwen/qwen3-30b-chat");
    assert_eq!(failure.base_url, server.uri());
}

#[tokio::test]
async fn on_chat_params_reports_offline_server() {
    let mut config = HuginnConfig::default();
    config.retry = config.retry.max_retries(0);
    let huginn = Huginn::builder().config(config).build().unwrap();

    let outcome = huginn
        .on_chat_params("qwen3-8b", &format!("http://127.0.0.1:{}", closed_port()))
        .await;

    let failure = outcome.failure().expect("failure");
    assert_eq!(failure.error.category, ErrorCategory::Offline);
    assert!(failure.error.auto_fix_available);
}

// =============================================================================
// Lookups
// =============================================================================

#[tokio::test]
async fn models_and_suggestions_use_configured_server() {
    let server = lm_studio(&["mistral-7b-instruct", "mistral-7b-chat", "phi-4"]).await;
    let huginn = Huginn::builder().base_url(server.uri()).build().unwrap();

    let models = huginn.models(None).await.unwrap();
    assert_eq!(models.len(), 3);

    let suggestions = huginn.suggest("mistral-7b-instruct-v0.2", None).await.unwrap();
    assert_eq!(suggestions[0].model_id, "mistral-7b-instruct");
    assert!(suggestions.iter().all(|s| s.model_id != "phi-4"));
}

#[tokio::test]
async fn resolve_without_any_server_fails() {
    let mut config = HuginnConfig::default();
    config.server.discovery_ports = vec![closed_port()];
    let huginn = Huginn::builder().config(config).build().unwrap();

    let err = huginn.resolve_base_url(None).await.unwrap_err();
    assert!(matches!(err, HuginnError::NoServerFound));
}
