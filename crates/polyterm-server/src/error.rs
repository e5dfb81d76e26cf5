//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] polyterm_gateway::GatewayError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] polyterm_telemetry::TelemetryError),
}

pub type AppResult<T> = Result<T, AppError>;
