//! HTTP client for OpenAI-compatible `/v1/models` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ModelSource, models_url};
use crate::telemetry;
use crate::{HuginnError, Result};

/// Default per-request timeout for model list fetches.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Default timeout for health checks.
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum number of bytes of an error body carried in [`HuginnError::Api`].
const MAX_ERROR_BODY: usize = 200;

/// `/v1/models` list response.
///
/// A missing `data` array deserializes as an empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

/// A single model entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub owned_by: Option<String>,
}

/// Timeouts for [`OpenAiCompatibleClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound for a model list fetch. Default: 3s.
    pub request_timeout: Duration,
    /// Upper bound for a health check. Default: 2s.
    pub health_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Create a config with default timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model list fetch timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the health check timeout.
    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }
}

/// Client for OpenAI-compatible inference servers (LM Studio, llama.cpp
/// server, vLLM, Ollama's OpenAI shim, ...).
///
/// Expects normalized base URLs (see
/// [`normalize_base_url()`](super::normalize_base_url)).
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: Client,
    config: ClientConfig,
}

impl OpenAiCompatibleClient {
    /// Create a client with default timeouts.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom timeouts.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HuginnError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// The configured timeouts.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch and decode the full `/v1/models` response.
    pub async fn list_models(&self, base_url: &str) -> Result<ModelsResponse> {
        self.request(base_url, self.config.request_timeout).await
    }

    async fn request(&self, base_url: &str, timeout: Duration) -> Result<ModelsResponse> {
        let url = models_url(base_url);
        let result = self.send(&url, timeout).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::FETCHES_TOTAL, "status" => status).increment(1);
        result
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<ModelsResponse> {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HuginnError::Api {
                status: status.as_u16(),
                message: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(url, timeout, e))?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ModelSource for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn fetch_model_ids(&self, base_url: &str) -> Result<Vec<String>> {
        let response = self.list_models(base_url).await?;
        let ids: Vec<String> = response.data.into_iter().map(|m| m.id).collect();
        debug!(base_url, count = ids.len(), "fetched model list");
        Ok(ids)
    }

    async fn health_check(&self, base_url: &str) -> bool {
        match self.request(base_url, self.config.health_timeout).await {
            Ok(_) => true,
            Err(e) => {
                debug!(base_url, error = %e, "health check failed");
                false
            }
        }
    }
}

/// Map a reqwest failure onto the typed transport variants.
fn map_transport_error(url: &str, timeout: Duration, err: reqwest::Error) -> HuginnError {
    if err.is_timeout() {
        warn!(url, timeout_ms = timeout.as_millis() as u64, "model list request timed out");
        HuginnError::Timeout { elapsed: timeout }
    } else if err.is_connect() {
        HuginnError::Connect {
            url: url.to_string(),
            reason: root_cause(&err),
        }
    } else {
        HuginnError::Http(err.to_string())
    }
}

/// Innermost error message; reqwest's own display only says "error sending request".
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
