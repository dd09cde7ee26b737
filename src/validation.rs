//! Model readiness validation.
//!
//! [`ModelValidator::validate()`] answers "is this model loaded and ready"
//! before an inference request goes out. Each call is an independent run
//! through a small state machine:
//!
//! ```text
//! NotStarted -> Checking -> (Retrying)* -> Succeeded
//!                                       \-> Failed
//! ```
//!
//! Checking reads the model list through the [`ModelStatusCache`] inside
//! [`with_retry()`]. A model missing from the list counts as a failed
//! attempt. Retries ask the server again without dropping the cached entry,
//! so a model that is still loading gets more than one chance to appear
//! while a server that stops answering mid-run still falls back to the
//! cached list. After the last attempt the error is classified and packaged
//! with remediation steps, similar loaded models and cache diagnostics. Raw
//! errors never reach the caller.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::cache::ModelStatusCache;
use crate::classify::{
    ClassifiedError, ClassifierKind, ErrorClassifier, ErrorContext, MessageClassifier, auto_fixes,
};
use crate::notify::{Notifier, TracingNotifier, deliver};
use crate::retry::{RetryConfig, with_retry};
use crate::similarity::rank;
use crate::source::{ModelSource, normalize_base_url};
use crate::telemetry;
use crate::types::{
    ValidationEvent, ValidationFailure, ValidationOutcome, ValidationState, ValidationSuccess,
};
use crate::{HuginnError, Result};

/// Settings for the validation path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Cache entries older than this earn a freshness hint. Default: 20s.
    #[serde(rename = "freshness_threshold_secs", with = "secs")]
    pub freshness_threshold: Duration,
    /// Overall time budget for the config hook. Default: 5s.
    #[serde(rename = "config_budget_ms", with = "crate::types::duration_ms")]
    pub config_budget: Duration,
    /// Classifier used for failures. Default: message patterns.
    pub classifier: ClassifierKind,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            freshness_threshold: Duration::from_secs(20),
            config_budget: Duration::from_secs(5),
            classifier: ClassifierKind::default(),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Validates model readiness against a shared [`ModelStatusCache`].
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct ModelValidator {
    cache: Arc<ModelStatusCache>,
    source: Arc<dyn ModelSource>,
    classifier: Arc<dyn ErrorClassifier>,
    notifier: Arc<dyn Notifier>,
    retry: RetryConfig,
    freshness_threshold: Duration,
}

impl ModelValidator {
    /// Create a validator with the default retry policy (2 retries, 500ms),
    /// message classifier and tracing notifier.
    pub fn new(cache: Arc<ModelStatusCache>, source: Arc<dyn ModelSource>) -> Self {
        Self {
            cache,
            source,
            classifier: Arc::new(MessageClassifier),
            notifier: Arc::new(TracingNotifier),
            retry: RetryConfig::default(),
            freshness_threshold: ValidationConfig::default().freshness_threshold,
        }
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the age past which a successful answer carries a freshness hint.
    pub fn freshness_threshold(mut self, threshold: Duration) -> Self {
        self.freshness_threshold = threshold;
        self
    }

    /// Set the failure classifier.
    pub fn classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the event sink.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// The cache this validator reads through.
    pub fn cache(&self) -> &Arc<ModelStatusCache> {
        &self.cache
    }

    /// Check that `model_id` is loaded on the server at `base_url`.
    ///
    /// Always completes with an outcome; transport and lookup errors are
    /// reported as [`ValidationOutcome::Failure`].
    pub async fn validate(&self, model_id: &str, base_url: &str) -> ValidationOutcome {
        let base = match normalize_base_url(base_url) {
            Ok(base) => base,
            Err(e) => {
                let outcome = self.failure(model_id, base_url, e, 0, false).await;
                self.finish(&outcome).await;
                return outcome;
            }
        };

        let run = Run::new(self, model_id, &base);
        run.advance(ValidationState::Checking).await;

        let result = with_retry(&self.retry, "validate", || run.attempt()).await;
        let attempts = run.attempts.load(Ordering::Relaxed);

        let outcome = match result {
            Ok(models) => {
                run.advance(ValidationState::Succeeded).await;
                self.success(model_id, &base, models, attempts)
            }
            Err(e) => {
                run.advance(ValidationState::Failed).await;
                self.failure(model_id, &base, e, attempts, true).await
            }
        };
        self.finish(&outcome).await;
        outcome
    }

    fn success(
        &self,
        model_id: &str,
        base: &str,
        loaded_models: Vec<String>,
        attempts: u32,
    ) -> ValidationOutcome {
        let cache_age = self.cache.entry(base).map(|entry| entry.age());
        let cache_valid = self.cache.is_valid(base);
        let performance_hint =
            performance_hint(loaded_models.len(), cache_age, self.freshness_threshold);

        ValidationOutcome::Success(ValidationSuccess {
            model_id: model_id.to_string(),
            base_url: base.to_string(),
            loaded_models,
            cache_age,
            cache_valid,
            performance_hint,
            attempts,
        })
    }

    async fn failure(
        &self,
        model_id: &str,
        base: &str,
        error: HuginnError,
        attempts: u32,
        reachable_base: bool,
    ) -> ValidationOutcome {
        let ctx = ErrorContext::new(base, model_id);
        let error: ClassifiedError = self.classifier.classify(&error, &ctx);
        let fixes = auto_fixes(error.category, &ctx);

        let candidates = if reachable_base {
            self.best_effort_models(base).await
        } else {
            Vec::new()
        };
        let suggestions = rank(model_id, &candidates);

        ValidationOutcome::Failure(ValidationFailure {
            model_id: model_id.to_string(),
            base_url: base.to_string(),
            error,
            auto_fixes: fixes,
            suggestions,
            cache_stats: self.cache.stats(),
            attempts,
        })
    }

    /// Fresh model list for suggestions; falls back to whatever the cache
    /// still holds, then to nothing.
    async fn best_effort_models(&self, base: &str) -> Vec<String> {
        match self.source.fetch_model_ids(base).await {
            Ok(models) => models,
            Err(e) => {
                debug!(base_url = base, error = %e, "suggestion fetch failed");
                self.cache.peek(base).unwrap_or_default()
            }
        }
    }

    async fn finish(&self, outcome: &ValidationOutcome) {
        let event = match outcome {
            ValidationOutcome::Success(s) => {
                metrics::counter!(telemetry::VALIDATIONS_TOTAL, "outcome" => "success")
                    .increment(1);
                info!(
                    model_id = %s.model_id,
                    base_url = %s.base_url,
                    attempts = s.attempts,
                    "model validated"
                );
                ValidationEvent::Succeeded {
                    model_id: s.model_id.clone(),
                    base_url: s.base_url.clone(),
                    loaded_models: s.loaded_models.len(),
                }
            }
            ValidationOutcome::Failure(f) => {
                metrics::counter!(telemetry::VALIDATIONS_TOTAL, "outcome" => "failure")
                    .increment(1);
                info!(
                    model_id = %f.model_id,
                    base_url = %f.base_url,
                    category = %f.error.category,
                    attempts = f.attempts,
                    "model validation failed"
                );
                ValidationEvent::Failed {
                    model_id: f.model_id.clone(),
                    base_url: f.base_url.clone(),
                    category: f.error.category,
                    severity: f.error.severity,
                    message: f.error.message.clone(),
                }
            }
        };
        deliver(self.notifier.as_ref(), event).await;
    }
}

/// One validation request.
struct Run<'a> {
    validator: &'a ModelValidator,
    model_id: &'a str,
    base: &'a str,
    state: Mutex<ValidationState>,
    attempts: AtomicU32,
}

impl<'a> Run<'a> {
    fn new(validator: &'a ModelValidator, model_id: &'a str, base: &'a str) -> Self {
        Self {
            validator,
            model_id,
            base,
            state: Mutex::new(ValidationState::NotStarted),
            attempts: AtomicU32::new(0),
        }
    }

    /// Move to `next`, announcing non-terminal states.
    async fn advance(&self, next: ValidationState) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, next)
        };
        debug_assert!(!previous.is_terminal(), "validation already finished");
        debug!(
            model_id = self.model_id,
            from = ?previous,
            to = ?next,
            "validation state"
        );

        if !next.is_terminal() {
            let event = ValidationEvent::Progress {
                model_id: self.model_id.to_string(),
                base_url: self.base.to_string(),
                state: next,
                attempt: self.attempts.load(Ordering::Relaxed).max(1),
            };
            deliver(self.validator.notifier.as_ref(), event).await;
        }
    }

    /// A single check: read the model list and look for the model.
    async fn attempt(&self) -> Result<Vec<String>> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt > 1 {
            self.advance(ValidationState::Retrying).await;
        }

        let source = &self.validator.source;
        let cache = &self.validator.cache;
        let fetch = || source.fetch_model_ids(self.base);
        let models = if attempt > 1 {
            // the cached list was already checked; ask the server again
            cache.revalidate(self.base, fetch).await?
        } else {
            cache.get_models(self.base, fetch).await?
        };

        if models.iter().any(|m| m == self.model_id) {
            Ok(models)
        } else {
            Err(HuginnError::ModelNotLoaded {
                model: self.model_id.to_string(),
            })
        }
    }
}

/// Advice attached to successful validations.
fn performance_hint(
    loaded: usize,
    cache_age: Option<Duration>,
    freshness_threshold: Duration,
) -> Option<String> {
    let mut hints = Vec::new();
    if loaded > 1 {
        hints.push(format!(
            "{loaded} models are loaded; unloading the ones you are not using frees memory and speeds up inference."
        ));
    }
    if let Some(age) = cache_age.filter(|age| *age > freshness_threshold) {
        hints.push(format!(
            "Model status is {}s old and may not reflect recent changes.",
            age.as_secs()
        ));
    }
    (!hints.is_empty()).then(|| hints.join(" "))
}
