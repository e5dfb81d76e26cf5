//! Upstream wire message types.

use polyterm_core::{OrderEvent, WalletAddress};
use serde::{Deserialize, Serialize};

/// Protocol version sent with every request.
pub const PROTOCOL_VERSION: u32 = 1;

// ============================================================================
// Requests (Outgoing)
// ============================================================================

/// Subscribe request for order events of a set of users.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    /// Always "subscribe".
    pub action: &'static str,
    /// Market platform (e.g., "polymarket").
    pub platform: String,
    /// Protocol version.
    pub version: u32,
    /// Event stream type, always "orders".
    #[serde(rename = "type")]
    pub stream_type: &'static str,
    /// Subscription filters.
    pub filters: SubscribeFilters,
}

/// Filters for a subscribe request.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeFilters {
    /// Lower-cased wallet addresses.
    pub users: Vec<String>,
}

impl SubscribeRequest {
    /// Build an order subscription for exactly one wallet.
    pub fn orders_for(platform: impl Into<String>, wallet: &WalletAddress) -> Self {
        Self {
            action: "subscribe",
            platform: platform.into(),
            version: PROTOCOL_VERSION,
            stream_type: "orders",
            filters: SubscribeFilters {
                users: vec![wallet.as_str().to_string()],
            },
        }
    }
}

/// Unsubscribe request for an acknowledged subscription.
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeRequest {
    /// Always "unsubscribe".
    pub action: &'static str,
    /// Protocol version.
    pub version: u32,
    /// Subscription id assigned by the upstream ack.
    pub subscription_id: String,
}

impl UnsubscribeRequest {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            action: "unsubscribe",
            version: PROTOCOL_VERSION,
            subscription_id: subscription_id.into(),
        }
    }
}

// ============================================================================
// Notifications (Incoming)
// ============================================================================

/// Message pushed by the upstream service.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamMessage {
    /// Subscription acknowledgement.
    Ack { subscription_id: String },
    /// Order notification for a subscribed wallet.
    Event {
        #[serde(default)]
        subscription_id: Option<String>,
        data: OrderEvent,
    },
    /// Service-reported error.
    Error {
        #[serde(default, alias = "error")]
        message: String,
    },
    /// Any other message type (pings, notices); ignored.
    #[serde(other)]
    Unknown,
}

impl UpstreamMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wallet() -> WalletAddress {
        WalletAddress::parse("0x6A72F61820B26B1FE4D956E17B6DC2A1EA3033EE").unwrap()
    }

    #[test]
    fn test_subscribe_request_shape() {
        let req = SubscribeRequest::orders_for("polymarket", &wallet());
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(
            value,
            json!({
                "action": "subscribe",
                "platform": "polymarket",
                "version": 1,
                "type": "orders",
                "filters": {"users": ["0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee"]}
            })
        );
    }

    #[test]
    fn test_unsubscribe_request_shape() {
        let value = serde_json::to_value(UnsubscribeRequest::new("sub_42")).unwrap();
        assert_eq!(
            value,
            json!({"action": "unsubscribe", "version": 1, "subscription_id": "sub_42"})
        );
    }

    #[test]
    fn test_parse_ack() {
        let msg = UpstreamMessage::parse(r#"{"type":"ack","subscription_id":"sub_abc"}"#).unwrap();
        assert!(matches!(msg, UpstreamMessage::Ack { subscription_id } if subscription_id == "sub_abc"));
    }

    #[test]
    fn test_parse_event() {
        let text = json!({
            "type": "event",
            "subscription_id": "sub_abc",
            "data": {
                "token_id": "123",
                "side": "SELL",
                "market_slug": "some-market",
                "condition_id": "0xcond",
                "shares": 2500000,
                "shares_normalized": 2.5,
                "price": 0.31,
                "tx_hash": "0xtx",
                "title": "Some market?",
                "timestamp": 1762755303,
                "order_hash": "0xorder",
                "user": "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee"
            }
        })
        .to_string();

        match UpstreamMessage::parse(&text).unwrap() {
            UpstreamMessage::Event {
                subscription_id,
                data,
            } => {
                assert_eq!(subscription_id.as_deref(), Some("sub_abc"));
                assert_eq!(data.token_id, "123");
                assert_eq!(data.market_slug, "some-market");
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_with_alias() {
        let msg = UpstreamMessage::parse(r#"{"type":"error","error":"bad filter"}"#).unwrap();
        assert!(matches!(msg, UpstreamMessage::Error { message } if message == "bad filter"));
    }

    #[test]
    fn test_parse_unknown_type() {
        let msg = UpstreamMessage::parse(r#"{"type":"pong"}"#).unwrap();
        assert!(matches!(msg, UpstreamMessage::Unknown));
    }

    #[test]
    fn test_parse_malformed_event_fails() {
        let result = UpstreamMessage::parse(r#"{"type":"event","data":{"token_id":"1"}}"#);
        assert!(result.is_err());
    }
}
