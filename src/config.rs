//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. `--config <path>`)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//! 4. built-in defaults
//!
//! `HUGINN_BASE_URL` overrides `server.base_url` after loading.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::monitor::MonitorConfig;
use crate::retry::RetryConfig;
use crate::source::{ClientConfig, DEFAULT_DISCOVERY_HOST, DEFAULT_PORTS};
use crate::validation::ValidationConfig;
use crate::{HuginnError, Result};

/// Environment variable overriding `server.base_url`.
pub const BASE_URL_ENV: &str = "HUGINN_BASE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HuginnConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Inference server location and request limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    /// Server base URL; auto-discovered when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Host probed during auto-discovery (default: 127.0.0.1).
    #[serde(default = "default_discovery_host")]
    pub discovery_host: String,
    /// Ports probed during auto-discovery, in order (default: 1234, 8080, 11434).
    #[serde(default = "default_discovery_ports")]
    pub discovery_ports: Vec<u16>,
    /// Model list request timeout in milliseconds (default: 3000).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Health check timeout in milliseconds (default: 2000).
    #[serde(default = "default_health_timeout")]
    pub health_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            discovery_host: default_discovery_host(),
            discovery_ports: default_discovery_ports(),
            request_timeout_ms: default_request_timeout(),
            health_timeout_ms: default_health_timeout(),
        }
    }
}

impl ServerConfig {
    /// Client timeouts described by this section.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new()
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .health_timeout(Duration::from_millis(self.health_timeout_ms))
    }
}

fn default_discovery_host() -> String {
    DEFAULT_DISCOVERY_HOST.to_string()
}

fn default_discovery_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

fn default_request_timeout() -> u64 {
    3000
}

fn default_health_timeout() -> u64 {
    2000
}

impl HuginnConfig {
    /// Load configuration from the standard locations, falling back to
    /// defaults when no file exists, then apply environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::var(BASE_URL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a single TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Apply the `HUGINN_BASE_URL` override, if set and non-empty.
    pub fn apply_env(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.server.base_url = Some(url);
        }
    }

    /// Reject values that would make the system unusable.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        if self.server.request_timeout_ms == 0 || self.server.health_timeout_ms == 0 {
            return Err(HuginnError::Configuration(
                "server timeouts must be non-zero".into(),
            ));
        }
        if self.validation.config_budget.is_zero() {
            return Err(HuginnError::Configuration(
                "validation config_budget_ms must be non-zero".into(),
            ));
        }
        if self.monitor.interval.is_zero() || self.monitor.timeout.is_zero() {
            return Err(HuginnError::Configuration(
                "monitor interval and timeout must be non-zero".into(),
            ));
        }
        if let Some(url) = &self.server.base_url {
            crate::source::normalize_base_url(url)?;
        }
        Ok(())
    }

    /// Resolve the config file path. `Ok(None)` means "use defaults".
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}
