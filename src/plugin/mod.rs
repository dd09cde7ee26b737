//! Host-facing facade.
//!
//! [`Huginn`] wires one cache, model source, validator and loading monitor
//! together and exposes the two hooks a host calls:
//!
//! - [`Huginn::on_config()`] when the host loads its configuration, to fill
//!   in local provider model lists.
//! - [`Huginn::on_chat_params()`] before each chat request, to check the
//!   selected model is loaded.

mod builder;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use builder::HuginnBuilder;

use crate::cache::{CacheStats, ModelStatusCache};
use crate::config::HuginnConfig;
use crate::host::{ConfigReport, HostConfig};
use crate::monitor::{LoadingMonitor, MonitorHandle};
use crate::similarity::{SimilarityCandidate, rank};
use crate::source::{ModelSource, discover, normalize_base_url};
use crate::types::ValidationOutcome;
use crate::validation::ModelValidator;
use crate::{HuginnError, Result};

/// Main entry point.
pub struct Huginn {
    config: HuginnConfig,
    cache: Arc<ModelStatusCache>,
    source: Arc<dyn ModelSource>,
    validator: ModelValidator,
    monitor: LoadingMonitor,
}

impl Huginn {
    /// Create a new builder.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }

    pub fn config(&self) -> &HuginnConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ModelStatusCache> {
        &self.cache
    }

    pub fn validator(&self) -> &ModelValidator {
        &self.validator
    }

    pub fn monitor(&self) -> &LoadingMonitor {
        &self.monitor
    }

    /// Resolve the server to talk to: `configured`, else `server.base_url`,
    /// else the first server found by auto-discovery.
    pub async fn resolve_base_url(&self, configured: Option<&str>) -> Result<String> {
        if let Some(url) = configured.or(self.config.server.base_url.as_deref()) {
            return normalize_base_url(url);
        }
        let server = &self.config.server;
        discover(
            self.source.as_ref(),
            &server.discovery_host,
            &server.discovery_ports,
        )
        .await
        .ok_or(HuginnError::NoServerFound)
    }

    /// Loaded models on a server, through the cache.
    pub async fn models(&self, base_url: Option<&str>) -> Result<Vec<String>> {
        let base = self.resolve_base_url(base_url).await?;
        self.fetch_through_cache(&base).await
    }

    /// Loaded models ranked by similarity to `model_id`.
    pub async fn suggest(
        &self,
        model_id: &str,
        base_url: Option<&str>,
    ) -> Result<Vec<SimilarityCandidate>> {
        let models = self.models(base_url).await?;
        Ok(rank(model_id, &models))
    }

    /// Config hook: validate local provider blocks and add the models the
    /// server currently has loaded.
    ///
    /// Never fails. Problems are reported as errors or warnings, and the
    /// whole pass is capped by `validation.config_budget`.
    pub async fn on_config(&self, host: &mut HostConfig) -> ConfigReport {
        let mut report = host.validate();
        let invalid: HashSet<String> = report.errors.iter().map(|e| e.provider.clone()).collect();
        let deadline = Instant::now() + self.config.validation.config_budget;

        for id in host.local_providers() {
            if invalid.contains(&id) {
                continue;
            }
            let configured = host
                .provider
                .get(&id)
                .and_then(|entry| entry.options.base_url.clone());

            let lookup = async {
                let base = self.resolve_base_url(configured.as_deref()).await?;
                let models = self.fetch_through_cache(&base).await?;
                Ok::<_, HuginnError>((base, models))
            };
            let (base, models) = match tokio::time::timeout_at(deadline, lookup).await {
                Ok(Ok(found)) => found,
                Ok(Err(e)) => {
                    warn!(provider = %id, error = %e, "could not load models for provider");
                    report.warn(&id, format!("could not load models: {e}"));
                    continue;
                }
                Err(_) => {
                    warn!(provider = %id, "config hook ran out of time");
                    report.warn(&id, "timed out loading models; configuration left unchanged");
                    continue;
                }
            };

            let Some(entry) = host.provider.get_mut(&id) else {
                continue;
            };
            if entry.options.base_url.is_none() {
                entry.options.base_url = Some(format!("{base}/v1"));
            }
            let added = entry.merge_models(&models);
            info!(provider = %id, base_url = %base, added = added.len(), "provider models merged");
            if !added.is_empty() {
                report.added_models.insert(id.clone(), added);
            }
        }
        report
    }

    /// Chat hook: check that `model_id` is loaded before a request goes out.
    pub async fn on_chat_params(&self, model_id: &str, base_url: &str) -> ValidationOutcome {
        self.validator.validate(model_id, base_url).await
    }

    /// Watch for `model_id` to finish loading on `base_url`.
    pub async fn watch_loading(
        &self,
        model_id: &str,
        base_url: &str,
    ) -> Result<Option<MonitorHandle>> {
        self.monitor.start(model_id, base_url).await
    }

    /// Cache diagnostics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn fetch_through_cache(&self, base: &str) -> Result<Vec<String>> {
        debug!(base_url = base, "reading model list");
        let source = &self.source;
        self.cache
            .get_models(base, || source.fetch_model_ids(base))
            .await
    }
}
