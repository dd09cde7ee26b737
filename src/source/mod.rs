//! Remote model source: where model lists come from.
//!
//! The [`ModelSource`] trait is the seam between the cache/validation layers
//! and the network. [`OpenAiCompatibleClient`] is the production
//! implementation, talking to `GET {base}/v1/models`; tests substitute
//! in-memory sources.
//!
//! # Base URL handling
//!
//! Callers may pass either `http://host:port` or `http://host:port/v1`
//! (with or without trailing slashes). [`normalize_base_url()`] reduces
//! both to the bare origin form, which is also the cache key.

mod client;
mod discover;

pub use client::{ClientConfig, ModelEntry, ModelsResponse, OpenAiCompatibleClient};
pub use discover::{DEFAULT_DISCOVERY_HOST, DEFAULT_PORTS, discover};

use async_trait::async_trait;
use reqwest::Url;

use crate::{HuginnError, Result};

/// A source of loaded-model identifiers for a server.
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Source name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch the identifiers of the models currently loaded at `base_url`.
    ///
    /// Fails with a distinguishable error on timeout or connection failure;
    /// never returns an empty list in place of an error.
    async fn fetch_model_ids(&self, base_url: &str) -> Result<Vec<String>>;

    /// Cheap reachability probe.
    ///
    /// Default implementation issues a full fetch and discards the result.
    async fn health_check(&self, base_url: &str) -> bool {
        self.fetch_model_ids(base_url).await.is_ok()
    }
}

/// Normalize a server base URL to its origin form.
///
/// Strips surrounding whitespace, trailing slashes and a trailing `/v1`
/// segment, then checks that what remains is an absolute `http(s)` URL.
///
/// ```rust
/// # use huginn::source::normalize_base_url;
/// assert_eq!(
///     normalize_base_url("http://127.0.0.1:1234/v1/").unwrap(),
///     "http://127.0.0.1:1234"
/// );
/// ```
pub fn normalize_base_url(base_url: &str) -> Result<String> {
    let mut trimmed = base_url.trim().trim_end_matches('/');
    if let Some(stripped) = trimmed.strip_suffix("/v1") {
        trimmed = stripped.trim_end_matches('/');
    }

    let parsed = Url::parse(trimmed).map_err(|e| HuginnError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(HuginnError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

/// The models endpoint for a normalized base URL.
pub(crate) fn models_url(base_url: &str) -> String {
    format!("{base_url}/v1/models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_suffix_and_slashes_are_equivalent() {
        let forms = [
            "http://127.0.0.1:1234",
            "http://127.0.0.1:1234/",
            "http://127.0.0.1:1234/v1",
            "http://127.0.0.1:1234/v1/",
            "  http://127.0.0.1:1234//  ",
        ];
        for form in forms {
            assert_eq!(
                normalize_base_url(form).unwrap(),
                "http://127.0.0.1:1234",
                "{form}"
            );
        }
    }

    #[test]
    fn path_prefix_is_kept() {
        assert_eq!(
            normalize_base_url("https://example.com/proxy/v1").unwrap(),
            "https://example.com/proxy"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = normalize_base_url("ftp://example.com").unwrap_err();
        assert!(matches!(err, HuginnError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn rejects_relative_url() {
        // parses with scheme "localhost"
        assert!(normalize_base_url("localhost:1234").is_err());
        assert!(normalize_base_url("/v1").is_err());
    }

    #[test]
    fn models_url_appends_path() {
        assert_eq!(
            models_url("http://127.0.0.1:1234"),
            "http://127.0.0.1:1234/v1/models"
        );
    }
}
