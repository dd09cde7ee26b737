//! Error classification: raw failures → categorized, user-facing reports.
//!
//! Two classifiers sit behind the [`ErrorClassifier`] trait:
//!
//! - [`MessageClassifier`] (default) matches the error's display string
//!   against a fixed pattern table. Brittle by construction, but it treats
//!   every error source uniformly, including failures raised by callers'
//!   own fetch functions.
//! - [`TransportClassifier`] inspects typed [`HuginnError`] variants and
//!   only falls back to the pattern table for errors it cannot place.
//!
//! Both are pure: no I/O, no state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::HuginnError;

/// How serious a failure is for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Failure taxonomy for model validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Server not running or refusing connections.
    Offline,
    /// Server did not answer within the request timeout.
    Timeout,
    /// Endpoint or model does not exist.
    NotFound,
    /// Server rejected the request's credentials.
    Permission,
    /// Transport failure other than a refused connection.
    Network,
    /// Anything else, including a model that is simply not loaded.
    Unknown,
}

impl ErrorCategory {
    /// Fixed severity of the category.
    pub fn severity(self) -> Severity {
        match self {
            ErrorCategory::Offline => Severity::Critical,
            ErrorCategory::Timeout | ErrorCategory::Unknown => Severity::Medium,
            ErrorCategory::NotFound | ErrorCategory::Permission | ErrorCategory::Network => {
                Severity::High
            }
        }
    }

    /// Whether retrying the same request can plausibly succeed.
    pub fn can_retry(self) -> bool {
        !matches!(self, ErrorCategory::NotFound | ErrorCategory::Permission)
    }

    /// Whether an automated fix (e.g. starting the server) is on offer.
    pub fn auto_fix_available(self) -> bool {
        matches!(self, ErrorCategory::Offline)
    }

    /// Stable snake_case name, as used in serialized reports and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Offline => "offline",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Network => "network",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Human-readable message for this category.
    pub fn message(self, ctx: &ErrorContext<'_>) -> String {
        let ErrorContext { base_url, model_id } = *ctx;
        match self {
            ErrorCategory::Offline => format!(
                "Cannot reach the inference server at {base_url}. Make sure it is running and its API server is started."
            ),
            ErrorCategory::Timeout => format!(
                "The inference server at {base_url} did not respond in time. It may still be loading '{model_id}'."
            ),
            ErrorCategory::NotFound => {
                format!("Model '{model_id}' was not found on the server at {base_url}.")
            }
            ErrorCategory::Permission => format!(
                "The server at {base_url} refused access to '{model_id}'. Check its authentication settings."
            ),
            ErrorCategory::Network => {
                format!("A network error interrupted the request to {base_url}.")
            }
            ErrorCategory::Unknown => {
                format!("Model '{model_id}' is not ready on the server at {base_url}.")
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was being validated when the error occurred.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub base_url: &'a str,
    pub model_id: &'a str,
}

impl<'a> ErrorContext<'a> {
    pub fn new(base_url: &'a str, model_id: &'a str) -> Self {
        Self { base_url, model_id }
    }
}

/// A categorized failure with remediation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub severity: Severity,
    /// Category message for the user.
    pub message: String,
    /// The underlying error's display string.
    pub detail: String,
    pub can_retry: bool,
    pub auto_fix_available: bool,
}

impl ClassifiedError {
    /// Build a report from a category, filling in the fixed metadata.
    pub fn from_category(
        category: ErrorCategory,
        ctx: &ErrorContext<'_>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity: category.severity(),
            message: category.message(ctx),
            detail: detail.into(),
            can_retry: category.can_retry(),
            auto_fix_available: category.auto_fix_available(),
        }
    }
}

/// Maps a raw error into the failure taxonomy.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &HuginnError, ctx: &ErrorContext<'_>) -> ClassifiedError;
}

/// Pattern table, in precedence order. First match wins.
const PATTERNS: &[(&[&str], ErrorCategory)] = &[
    (&["econnrefused", "fetch failed", "network"], ErrorCategory::Offline),
    (&["timeout", "aborted"], ErrorCategory::Timeout),
    (&["404", "not found"], ErrorCategory::NotFound),
    (&["401", "403", "unauthorized"], ErrorCategory::Permission),
];

/// Categorize an error message by case-insensitive substring match.
///
/// ```rust
/// # use huginn::classify::{categorize_message, ErrorCategory};
/// assert_eq!(categorize_message("fetch failed: ECONNREFUSED"), ErrorCategory::Offline);
/// assert_eq!(categorize_message("HTTP 404"), ErrorCategory::NotFound);
/// assert_eq!(categorize_message("model not loaded"), ErrorCategory::Unknown);
/// ```
pub fn categorize_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    PATTERNS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}

/// Classifies by the error's display string.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageClassifier;

impl ErrorClassifier for MessageClassifier {
    fn classify(&self, error: &HuginnError, ctx: &ErrorContext<'_>) -> ClassifiedError {
        let detail = error.to_string();
        ClassifiedError::from_category(categorize_message(&detail), ctx, detail)
    }
}

/// Classifies by typed transport cause, falling back to the message table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportClassifier;

impl ErrorClassifier for TransportClassifier {
    fn classify(&self, error: &HuginnError, ctx: &ErrorContext<'_>) -> ClassifiedError {
        let category = match error {
            HuginnError::Connect { .. } | HuginnError::NoServerFound => ErrorCategory::Offline,
            HuginnError::Timeout { .. } => ErrorCategory::Timeout,
            HuginnError::Api { status: 404, .. } => ErrorCategory::NotFound,
            HuginnError::Api {
                status: 401 | 403, ..
            } => ErrorCategory::Permission,
            HuginnError::Api { .. } | HuginnError::Http(_) => ErrorCategory::Network,
            HuginnError::ModelNotLoaded { .. } => ErrorCategory::Unknown,
            other => categorize_message(&other.to_string()),
        };
        ClassifiedError::from_category(category, ctx, error.to_string())
    }
}

/// Which classifier to use, as named in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    #[default]
    Message,
    Transport,
}

impl ClassifierKind {
    /// Instantiate the named classifier.
    pub fn build(self) -> Arc<dyn ErrorClassifier> {
        match self {
            ClassifierKind::Message => Arc::new(MessageClassifier),
            ClassifierKind::Transport => Arc::new(TransportClassifier),
        }
    }
}

/// Remediation steps for a category, most useful first.
pub fn auto_fixes(category: ErrorCategory, ctx: &ErrorContext<'_>) -> Vec<String> {
    let ErrorContext { base_url, model_id } = *ctx;
    match category {
        ErrorCategory::Offline => vec![
            "Start the local inference server (in LM Studio: Developer > Start Server)".into(),
            format!("Check that the server listens on {base_url}"),
            "Run `huginn discover` to look for a server on another port".into(),
        ],
        ErrorCategory::Timeout => vec![
            format!("Wait for '{model_id}' to finish loading, then retry"),
            "Close other applications competing for GPU or memory".into(),
            "Raise `server.request_timeout_ms` in the huginn configuration".into(),
        ],
        ErrorCategory::NotFound => vec![
            format!("Load '{model_id}' in the inference server"),
            "Check the model id for typos against the server's model list".into(),
        ],
        ErrorCategory::Permission => vec![
            format!("Check the API key configured for {base_url}"),
            "Disable authentication on the local server or supply valid credentials".into(),
        ],
        ErrorCategory::Network => vec![
            format!("Check connectivity to {base_url}"),
            "Retry once the connection is stable".into(),
        ],
        ErrorCategory::Unknown => vec![
            format!("Load '{model_id}' in the inference server, or pick one of the suggested models"),
            "Inspect the server logs for errors".into(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_offline_beats_timeout() {
        // both patterns present: the earlier row wins
        assert_eq!(
            categorize_message("network timeout"),
            ErrorCategory::Offline
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(categorize_message("Request ABORTED"), ErrorCategory::Timeout);
        assert_eq!(categorize_message("Unauthorized"), ErrorCategory::Permission);
    }

    #[test]
    fn category_table() {
        use ErrorCategory::*;
        let table = [
            (Offline, Severity::Critical, true, true),
            (Timeout, Severity::Medium, true, false),
            (NotFound, Severity::High, false, false),
            (Permission, Severity::High, false, false),
            (Network, Severity::High, true, false),
            (Unknown, Severity::Medium, true, false),
        ];
        for (category, severity, can_retry, auto_fix) in table {
            assert_eq!(category.severity(), severity, "{category}");
            assert_eq!(category.can_retry(), can_retry, "{category}");
            assert_eq!(category.auto_fix_available(), auto_fix, "{category}");
        }
    }

    #[test]
    fn severity_orders_by_seriousness() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn every_category_has_fixes() {
        let ctx = ErrorContext::new("http://127.0.0.1:1234", "qwen3-8b");
        for category in [
            ErrorCategory::Offline,
            ErrorCategory::Timeout,
            ErrorCategory::NotFound,
            ErrorCategory::Permission,
            ErrorCategory::Network,
            ErrorCategory::Unknown,
        ] {
            assert!(!auto_fixes(category, &ctx).is_empty(), "{category}");
        }
    }
}
