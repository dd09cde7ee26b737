//! Validation results.

use std::time::Duration;

use serde::Serialize;

use super::duration_ms;
use crate::cache::CacheStats;
use crate::classify::ClassifiedError;
use crate::similarity::SimilarityCandidate;

/// Result of validating that a model is ready to use.
///
/// Serializes with a `status` tag (`"success"` / `"failure"`) so hosts can
/// forward it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Success(ValidationSuccess),
    Failure(ValidationFailure),
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success(_))
    }

    /// The model that was validated.
    pub fn model_id(&self) -> &str {
        match self {
            ValidationOutcome::Success(s) => &s.model_id,
            ValidationOutcome::Failure(f) => &f.model_id,
        }
    }

    /// Attempts made before reaching this outcome.
    pub fn attempts(&self) -> u32 {
        match self {
            ValidationOutcome::Success(s) => s.attempts,
            ValidationOutcome::Failure(f) => f.attempts,
        }
    }

    pub fn success(&self) -> Option<&ValidationSuccess> {
        match self {
            ValidationOutcome::Success(s) => Some(s),
            ValidationOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            ValidationOutcome::Success(_) => None,
            ValidationOutcome::Failure(f) => Some(f),
        }
    }
}

/// The model is loaded and ready.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSuccess {
    pub model_id: String,
    pub base_url: String,
    /// Every model the server reports as loaded.
    pub loaded_models: Vec<String>,
    /// Age of the cache entry the answer came from.
    #[serde(rename = "cache_age_ms", serialize_with = "duration_ms::serialize_opt")]
    pub cache_age: Option<Duration>,
    /// Whether that entry is still within its ttl.
    pub cache_valid: bool,
    /// Advice on memory use or data freshness, when relevant.
    pub performance_hint: Option<String>,
    pub attempts: u32,
}

/// The model could not be confirmed after all retries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub model_id: String,
    pub base_url: String,
    /// Category, severity, message and retry/auto-fix flags.
    #[serde(flatten)]
    pub error: ClassifiedError,
    /// Remediation steps for the error category.
    pub auto_fixes: Vec<String>,
    /// Loaded models resembling the requested one, best first.
    pub suggestions: Vec<SimilarityCandidate>,
    pub cache_stats: CacheStats,
    pub attempts: u32,
}
