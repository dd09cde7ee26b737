//! Host application configuration schema.
//!
//! The host hands its configuration to the config hook as JSON shaped like:
//!
//! ```json
//! {
//!   "provider": {
//!     "lmstudio": {
//!       "npm": "@ai-sdk/openai-compatible",
//!       "name": "LM Studio (local)",
//!       "options": { "baseURL": "http://127.0.0.1:1234/v1" },
//!       "models": { "qwen3-8b": { "name": "Qwen3 8B" } }
//!     }
//!   }
//! }
//! ```
//!
//! Unknown keys are preserved so the document round-trips untouched apart
//! from the models huginn adds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::source::normalize_base_url;

/// npm package that marks a provider as OpenAI-compatible.
pub const OPENAI_COMPATIBLE_NPM: &str = "@ai-sdk/openai-compatible";

/// Provider ids treated as local OpenAI-compatible servers regardless of `npm`.
const LOCAL_PROVIDER_IDS: &[&str] = &["lmstudio", "llamacpp", "ollama-openai"];

/// The host's configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub provider: BTreeMap<String, ProviderEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One `provider.<id>` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub options: ProviderOptions,
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `provider.<id>.options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOptions {
    #[serde(rename = "baseURL", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(rename = "apiKey", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `provider.<id>.models.<model-id>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Recognized provider shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderShape {
    /// A local server speaking the OpenAI API. `base_url` is `None` when the
    /// host left it to auto-discovery.
    LocalOpenAiCompatible { base_url: Option<String> },
    /// Anything huginn does not manage.
    Other,
}

impl ProviderEntry {
    /// Classify this entry.
    pub fn shape(&self, id: &str) -> ProviderShape {
        let openai_npm = self.npm.as_deref() == Some(OPENAI_COMPATIBLE_NPM);
        if openai_npm || LOCAL_PROVIDER_IDS.contains(&id) {
            ProviderShape::LocalOpenAiCompatible {
                base_url: self.options.base_url.clone(),
            }
        } else {
            ProviderShape::Other
        }
    }

    /// Add `model_ids` missing from `models`. Existing entries are left as
    /// the user wrote them. Returns the ids that were added.
    pub fn merge_models<S: AsRef<str>>(&mut self, model_ids: &[S]) -> Vec<String> {
        let mut added = Vec::new();
        for id in model_ids {
            let id = id.as_ref();
            if !self.models.contains_key(id) {
                self.models.insert(
                    id.to_string(),
                    ModelEntry {
                        name: Some(id.to_string()),
                        ..Default::default()
                    },
                );
                added.push(id.to_string());
            }
        }
        added
    }
}

impl HostConfig {
    /// Parse a host configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Ids of providers with the local OpenAI-compatible shape.
    pub fn local_providers(&self) -> Vec<String> {
        self.provider
            .iter()
            .filter(|(id, entry)| {
                matches!(entry.shape(id), ProviderShape::LocalOpenAiCompatible { .. })
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Check every managed provider block.
    pub fn validate(&self) -> ConfigReport {
        let mut report = ConfigReport::default();
        for (id, entry) in &self.provider {
            let ProviderShape::LocalOpenAiCompatible { base_url } = entry.shape(id) else {
                continue;
            };

            match base_url.as_deref() {
                Some(url) => {
                    if let Err(e) = normalize_base_url(url) {
                        report.error(id, e.to_string());
                    }
                }
                None => report.warn(id, "no baseURL set; the server will be auto-discovered"),
            }
            if entry.npm.is_none() {
                report.warn(
                    id,
                    format!("no npm package set; the host may need \"{OPENAI_COMPATIBLE_NPM}\""),
                );
            }
            if entry.models.is_empty() {
                report.warn(id, "no models configured; loaded models will be added");
            }
        }
        report
    }
}

/// A problem found in a provider block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    pub provider: String,
    pub message: String,
}

/// Errors and warnings from validating or enhancing a host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigReport {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
    /// Model ids added per provider.
    pub added_models: BTreeMap<String, Vec<String>>,
}

impl ConfigReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn error(&mut self, provider: &str, message: impl Into<String>) {
        self.errors.push(ConfigIssue {
            provider: provider.to_string(),
            message: message.into(),
        });
    }

    pub(crate) fn warn(&mut self, provider: &str, message: impl Into<String>) {
        self.warnings.push(ConfigIssue {
            provider: provider.to_string(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_by_npm_or_id() {
        let by_npm = ProviderEntry {
            npm: Some(OPENAI_COMPATIBLE_NPM.into()),
            ..Default::default()
        };
        assert!(matches!(
            by_npm.shape("my-box"),
            ProviderShape::LocalOpenAiCompatible { base_url: None }
        ));
        assert!(matches!(
            ProviderEntry::default().shape("lmstudio"),
            ProviderShape::LocalOpenAiCompatible { .. }
        ));
        assert_eq!(ProviderEntry::default().shape("anthropic"), ProviderShape::Other);
    }

    #[test]
    fn merge_keeps_user_entries() {
        let mut entry = ProviderEntry::default();
        entry.models.insert(
            "qwen3-8b".into(),
            ModelEntry {
                name: Some("My Qwen".into()),
                ..Default::default()
            },
        );

        let added = entry.merge_models(&["qwen3-8b", "gemma-3-4b"]);

        assert_eq!(added, vec!["gemma-3-4b"]);
        assert_eq!(entry.models["qwen3-8b"].name.as_deref(), Some("My Qwen"));
        assert_eq!(entry.models["gemma-3-4b"].name.as_deref(), Some("gemma-3-4b"));
    }
}
