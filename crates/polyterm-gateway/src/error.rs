//! Gateway error types.
//!
//! Only failures detected before a stream opens become HTTP statuses.
//! Anything that happens on a live stream is reported in-stream.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use polyterm_dispatch::DispatchError;
use polyterm_telemetry::TelemetryError;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Too many active streams (limit {0})")]
    TooManySessions(usize),

    #[error("Collaborator returned non-JSON response after {attempts} attempts")]
    NonJsonResponse { attempts: u32 },

    #[error("Collaborator request failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::TooManySessions(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NonJsonResponse { .. } | Self::Dispatch(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) | Self::Serialization(_) | Self::Telemetry(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
