//! Builder for configuring [`Huginn`] instances

use std::sync::Arc;

use super::Huginn;
use crate::Result;
use crate::cache::ModelStatusCache;
use crate::config::HuginnConfig;
use crate::monitor::LoadingMonitor;
use crate::notify::{Notifier, TracingNotifier};
use crate::source::{ModelSource, OpenAiCompatibleClient};
use crate::validation::ModelValidator;

/// Builder for configuring [`Huginn`] instances.
pub struct HuginnBuilder {
    config: HuginnConfig,
    source: Option<Arc<dyn ModelSource>>,
    notifier: Option<Arc<dyn Notifier>>,
    cache: Option<Arc<ModelStatusCache>>,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            config: HuginnConfig::default(),
            source: None,
            notifier: None,
            cache: None,
        }
    }

    /// Use a loaded configuration (default: built-in defaults).
    pub fn config(mut self, config: HuginnConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin the inference server instead of auto-discovering it.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.server.base_url = Some(url.into());
        self
    }

    /// Replace the HTTP model source, e.g. with a test double.
    pub fn source(mut self, source: Arc<dyn ModelSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the event sink (default: [`TracingNotifier`]).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Share an existing cache instead of creating one from `config.cache`.
    pub fn cache(mut self, cache: Arc<ModelStatusCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the instance.
    ///
    /// Fails with [`HuginnError::Configuration`](crate::HuginnError::Configuration)
    /// on invalid settings.
    pub fn build(self) -> Result<Huginn> {
        let config = self.config;
        config.validate()?;

        let source: Arc<dyn ModelSource> = match self.source {
            Some(source) => source,
            None => Arc::new(OpenAiCompatibleClient::with_config(
                config.server.client_config(),
            )?),
        };
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier) as Arc<dyn Notifier>);
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ModelStatusCache::with_config(config.cache.clone())));

        let validator = ModelValidator::new(Arc::clone(&cache), Arc::clone(&source))
            .retry(config.retry.clone())
            .freshness_threshold(config.validation.freshness_threshold)
            .classifier(config.validation.classifier.build())
            .notifier(Arc::clone(&notifier));
        let monitor = LoadingMonitor::new(Arc::clone(&cache), Arc::clone(&source))
            .config(config.monitor.clone())
            .notifier(notifier);

        Ok(Huginn {
            config,
            cache,
            source,
            validator,
            monitor,
        })
    }
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
