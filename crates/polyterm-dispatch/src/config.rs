//! Collaborator endpoint configuration.

use crate::dispatcher::{RetryableRequest, DEFAULT_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default path of the order placement collaborator.
pub const DEFAULT_ORDER_PATH: &str = "/api/place-order";
/// Default path of the claim collaborator.
pub const DEFAULT_CLAIM_PATH: &str = "/api/claim";

/// Dispatch settings (`[dispatch]` section).
#[derive(Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Base URL of the collaborator service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Full order URL; overrides `base_url` + default path.
    #[serde(default)]
    pub order_url: Option<String>,

    /// Full claim URL; overrides `base_url` + default path.
    #[serde(default)]
    pub claim_url: Option<String>,

    /// Bearer token for collaborator calls. Environment only.
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
            order_url: None,
            claim_url: None,
            token: None,
        }
    }
}

impl fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("order_url", &self.order_url)
            .field("claim_url", &self.claim_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl DispatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn order_url(&self) -> String {
        self.resolve(self.order_url.as_deref(), DEFAULT_ORDER_PATH)
    }

    pub fn claim_url(&self) -> String {
        self.resolve(self.claim_url.as_deref(), DEFAULT_CLAIM_PATH)
    }

    /// Build a request carrying this config's retry policy.
    pub fn request(&self, url: impl Into<String>, body: serde_json::Value) -> RetryableRequest {
        RetryableRequest::new(url, body).with_retry(self.max_attempts, self.retry_delay())
    }

    fn resolve(&self, explicit: Option<&str>, path: &str) -> String {
        match explicit {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}{}", self.base_url.trim_end_matches('/'), path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.order_url(), "http://127.0.0.1:3000/api/place-order");
        assert_eq!(config.claim_url(), "http://127.0.0.1:3000/api/claim");
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = DispatchConfig {
            base_url: "https://collab.example/".to_string(),
            order_url: Some("https://orders.example/place".to_string()),
            ..Default::default()
        };
        assert_eq!(config.order_url(), "https://orders.example/place");
        assert_eq!(config.claim_url(), "https://collab.example/api/claim");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = DispatchConfig {
            token: Some("super-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_request_carries_policy() {
        let config = DispatchConfig {
            max_attempts: 5,
            retry_delay_ms: 10,
            ..Default::default()
        };
        let request = config.request(config.order_url(), serde_json::json!({"a": 1}));
        assert_eq!(request.max_attempts, 5);
        assert_eq!(request.retry_delay, Duration::from_millis(10));
        assert_eq!(request.attempt, 0);
    }
}
