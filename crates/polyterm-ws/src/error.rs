//! Upstream feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Message parse error: {0}")]
    ParseError(String),

    #[error("Subscription error: {0}")]
    SubscriptionError(String),

    #[error("Subscription not acknowledged within {0}ms")]
    SubscribeTimeout(u64),

    #[error("Client closed")]
    Closed,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// Message safe to show to downstream clients.
    ///
    /// Transport and parser internals are collapsed into generic text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Tungstenite(_) => "Upstream connection failed".to_string(),
            Self::ConnectionClosed { .. } => "Upstream connection closed".to_string(),
            Self::SendFailed(_) => "Failed to send request upstream".to_string(),
            Self::ParseError(_) | Self::Json(_) => {
                "Received malformed message from upstream".to_string()
            }
            Self::SubscriptionError(reason) => format!("Subscription failed: {reason}"),
            Self::SubscribeTimeout(_) => "Subscription timed out".to_string(),
            Self::Closed => "Upstream client closed".to_string(),
        }
    }
}

pub type WsResult<T> = Result<T, WsError>;
