//! Gateway configuration.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// HTTP server and stream session settings (`[server]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Heartbeat period for every stream.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Outward messages buffered per stream.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Maximum concurrent streams.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    256
}

fn default_max_sessions() -> usize {
    1000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            channel_capacity: default_channel_capacity(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl GatewayConfig {
    pub fn socket_addr(&self) -> GatewayResult<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| GatewayError::Configuration(format!("invalid bind address: {e}")))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Reject values that would stall or disable streams.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(GatewayError::Configuration(
                "heartbeat_interval_ms must be positive".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(GatewayError::Configuration(
                "channel_capacity must be positive".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(GatewayError::Configuration(
                "max_sessions must be positive".to_string(),
            ));
        }
        self.socket_addr().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = GatewayConfig {
            heartbeat_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GatewayConfig {
            bind: "not an ip".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GatewayError::Configuration(_))
        ));
    }
}
