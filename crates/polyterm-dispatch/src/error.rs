//! Dispatch error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Response is not JSON: {0}")]
    NotJson(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
