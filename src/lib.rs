//! Huginn - model status cache and readiness validation for local
//! OpenAI-compatible inference servers (LM Studio, llama.cpp, Ollama).
//!
//! Before a chat request goes out, huginn checks that the selected model is
//! actually loaded on the server. Model lists are cached per server with a
//! short ttl, refreshed single-flight, and served stale when the server
//! briefly stops answering. Failures come back as classified reports with
//! remediation steps and similar loaded models, never as raw errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::Huginn;
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let huginn = Huginn::builder()
//!         .base_url("http://127.0.0.1:1234")
//!         .build()?;
//!
//!     let outcome = huginn
//!         .on_chat_params("qwen3-8b", "http://127.0.0.1:1234")
//!         .await;
//!
//!     match outcome.failure() {
//!         None => println!("ready"),
//!         Some(failure) => {
//!             println!("{}", failure.error.message);
//!             for candidate in &failure.suggestions {
//!                 println!("  try {} ({})", candidate.model_id, candidate.reasons_summary());
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Using the cache directly
//!
//! ```rust
//! use huginn::{CacheConfig, ModelStatusCache};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> huginn::Result<()> {
//! let cache = ModelStatusCache::with_config(CacheConfig::new().ttl(Duration::from_secs(30)));
//! let models = cache
//!     .get_models("http://127.0.0.1:1234", || async { Ok(vec!["qwen3-8b".to_string()]) })
//!     .await?;
//! assert_eq!(models, vec!["qwen3-8b"]);
//! assert!(cache.is_valid("http://127.0.0.1:1234"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod host;
pub mod monitor;
pub mod notify;
pub mod plugin;
pub mod retry;
pub mod similarity;
pub mod source;
pub mod telemetry;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheEntry, CacheStats, EntryStats, ModelStatusCache};
pub use classify::{
    ClassifiedError, ClassifierKind, ErrorCategory, ErrorClassifier, ErrorContext,
    MessageClassifier, Severity, TransportClassifier,
};
pub use config::HuginnConfig;
pub use error::{HuginnError, Result};
pub use host::{ConfigReport, HostConfig, ProviderShape};
pub use monitor::{LoadingMonitor, MonitorConfig, MonitorHandle};
pub use notify::{ChannelNotifier, NoopNotifier, Notifier, TracingNotifier};
pub use plugin::{Huginn, HuginnBuilder};
pub use retry::{RetryConfig, with_retry};
pub use similarity::SimilarityCandidate;
pub use source::{ModelSource, OpenAiCompatibleClient};
pub use types::{
    LoadingState, ValidationEvent, ValidationFailure, ValidationOutcome, ValidationState,
    ValidationSuccess,
};
pub use validation::{ModelValidator, ValidationConfig};
