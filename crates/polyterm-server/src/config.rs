//! Application configuration.
//!
//! Settings come from a TOML file. Secrets and collaborator URL overrides
//! come from the environment only.

use crate::error::{AppError, AppResult};
use polyterm_dispatch::DispatchConfig;
use polyterm_gateway::GatewayConfig;
use polyterm_ws::UpstreamConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Config file used when neither `--config` nor `POLYTERM_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

pub const CONFIG_PATH_ENV: &str = "POLYTERM_CONFIG";
pub const UPSTREAM_API_KEY_ENV: &str = "POLYTERM_UPSTREAM_API_KEY";
pub const DISPATCH_TOKEN_ENV: &str = "POLYTERM_DISPATCH_TOKEN";
pub const ORDER_URL_ENV: &str = "POLYTERM_ORDER_URL";
pub const CLAIM_URL_ENV: &str = "POLYTERM_CLAIM_URL";

/// Upstream push service settings (`[upstream]` section).
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Consecutive reconnect attempts before giving up (0 = infinite).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_subscribe_timeout_ms")]
    pub subscribe_timeout_ms: u64,
    /// Read from `POLYTERM_UPSTREAM_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_upstream_url() -> String {
    UpstreamConfig::default().url
}

fn default_platform() -> String {
    UpstreamConfig::default().platform
}

fn default_max_reconnect_attempts() -> u32 {
    UpstreamConfig::default().max_reconnect_attempts
}

fn default_reconnect_delay_ms() -> u64 {
    UpstreamConfig::default().reconnect_delay_ms
}

fn default_subscribe_timeout_ms() -> u64 {
    UpstreamConfig::default().subscribe_timeout_ms
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            platform: default_platform(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            subscribe_timeout_ms: default_subscribe_timeout_ms(),
            api_key: None,
        }
    }
}

impl fmt::Debug for UpstreamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSettings")
            .field("url", &self.url)
            .field("platform", &self.platform)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("subscribe_timeout_ms", &self.subscribe_timeout_ms)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl UpstreamSettings {
    /// Client config, or `None` when no API key is available.
    pub fn client_config(&self) -> Option<UpstreamConfig> {
        let api_key = self.api_key.as_ref().filter(|key| !key.is_empty())?;
        Some(UpstreamConfig {
            url: self.url.clone(),
            api_key: api_key.clone(),
            platform: self.platform.clone(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_delay_ms: self.reconnect_delay_ms,
            subscribe_timeout_ms: self.subscribe_timeout_ms,
        })
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: GatewayConfig,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl AppConfig {
    /// Resolve the config path, read it, and overlay the environment.
    ///
    /// An explicit path (CLI or `POLYTERM_CONFIG`) must exist. A missing
    /// default file falls back to built-in defaults.
    pub fn load(cli_path: Option<String>) -> AppResult<Self> {
        let explicit = cli_path.or_else(|| std::env::var(CONFIG_PATH_ENV).ok());

        let mut config = match explicit {
            Some(path) => {
                tracing::info!(config_path = %path, "Loading configuration");
                Self::from_file(&path)?
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                tracing::info!(config_path = DEFAULT_CONFIG_PATH, "Loading configuration");
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => {
                tracing::warn!(
                    path = DEFAULT_CONFIG_PATH,
                    "Config file not found, using defaults"
                );
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Overlay secrets and URL overrides. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = get(UPSTREAM_API_KEY_ENV) {
            self.upstream.api_key = Some(key);
        }
        if let Some(token) = get(DISPATCH_TOKEN_ENV) {
            self.dispatch.token = Some(token);
        }
        if let Some(url) = get(ORDER_URL_ENV) {
            self.dispatch.order_url = Some(url);
        }
        if let Some(url) = get(CLAIM_URL_ENV) {
            self.dispatch.claim_url = Some(url);
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        self.server
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if self.dispatch.max_attempts == 0 {
            return Err(AppError::Config(
                "dispatch.max_attempts must be positive".to_string(),
            ));
        }
        if self.upstream.reconnect_delay_ms == 0 {
            return Err(AppError::Config(
                "upstream.reconnect_delay_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
