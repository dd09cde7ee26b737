//! Huginn error types

use std::time::Duration;

/// Huginn error types
///
/// Display strings are part of the contract: the message-based
/// [`MessageClassifier`](crate::classify::MessageClassifier) matches on them,
/// so transport variants deliberately carry the vocabulary it looks for
/// ("network", "timeout", the HTTP status code).
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Transport errors
    #[error("network error: could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("request timeout after {}ms", .elapsed.as_millis())]
    Timeout { elapsed: Duration },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("model '{model}' is not loaded on the server")]
    ModelNotLoaded { model: String },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no inference server answered on any candidate port")]
    NoServerFound,

    // Outbound collaborator errors
    #[error("notification delivery failed: {0}")]
    Notify(String),
}

impl HuginnError {
    /// Whether the error came from the transport layer (connect, timeout,
    /// HTTP status) rather than from interpreting a successful response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HuginnError::Connect { .. }
                | HuginnError::Timeout { .. }
                | HuginnError::Http(_)
                | HuginnError::Api { .. }
        )
    }

    /// HTTP status code, when the server answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            HuginnError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
