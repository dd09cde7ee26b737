//! Retry configuration, delay calculation, and the shared retry helper.
//!
//! [`with_retry()`] drives any async operation with bounded retries and
//! exponential backoff. Unlike a provider-level decorator it does not
//! filter by error kind: every failure is retried the same way, since a
//! model that is still loading looks identical to one that is missing.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::telemetry;
use crate::Result;

/// Configuration for retry behaviour.
///
/// ```rust
/// # use huginn::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(4)
///     .base_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt. 0 = single attempt. Default: 2.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    /// Default: 500ms.
    #[serde(rename = "base_delay_ms", with = "crate::types::duration_ms")]
    pub base_delay: Duration,
    /// Upper bound on a single backoff sleep. Default: 30s.
    #[serde(rename = "max_delay_ms", with = "crate::types::duration_ms")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with the default policy (2 retries, 500ms).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries after the initial attempt.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Total attempts including the initial one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after the failed attempt with the given zero-based index.
    ///
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Execute an async operation with retry logic.
///
/// Attempts `f` up to `config.max_attempts()` times, sleeping
/// [`delay_for_attempt()`](RetryConfig::delay_for_attempt) between
/// attempts. Every error is retried; the final failure is returned
/// immediately, without a trailing sleep.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts();
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(operation, attempts = attempt + 1, "succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if attempt + 1 < max_attempts => {
                metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
                    .increment(1);
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let config = RetryConfig::new();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig::new().max_delay(Duration::from_millis(700));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(700));
    }

    #[test]
    fn delay_saturates_on_huge_attempt() {
        let config = RetryConfig::new();
        assert_eq!(config.delay_for_attempt(u32::MAX), config.max_delay);
    }

    #[test]
    fn disabled_means_single_attempt() {
        assert_eq!(RetryConfig::disabled().max_attempts(), 1);
    }

    #[test]
    fn deserializes_millisecond_fields() {
        let config: RetryConfig =
            toml::from_str("max_retries = 4\nbase_delay_ms = 250").unwrap();
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }
}
