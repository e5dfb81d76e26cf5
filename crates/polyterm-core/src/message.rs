//! Outward stream messages.
//!
//! Every frame written to a downstream stream is an `OutwardMessage`,
//! serialized as `{"type": ..., "data": ..., "timestamp": ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an outward message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Upstream link is open.
    Connected,
    /// Wallet subscription acknowledged upstream.
    Subscribed,
    /// One upstream order notification.
    Order,
    /// In-stream error notification.
    Error,
    /// Upstream link is currently down.
    Disconnected,
    /// Periodic liveness message.
    Heartbeat,
}

impl MessageKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Subscribed => "subscribed",
            Self::Order => "order",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message destined for a downstream stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutwardMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: serde_json::Value,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
}

impl OutwardMessage {
    /// Create a message stamped with the current time.
    pub fn new(kind: MessageKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Serialize to the JSON text carried in one stream frame.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
