//! Upstream events to outward messages.
//!
//! Stateless: every function maps its input to exactly one message.

use polyterm_core::{MessageKind, OrderEvent, OutwardMessage, WalletAddress};
use serde_json::json;

/// Translate one order notification.
///
/// The payload carries the twelve order fields and nothing else.
pub fn order(event: &OrderEvent) -> serde_json::Result<OutwardMessage> {
    Ok(OutwardMessage::new(
        MessageKind::Order,
        serde_json::to_value(event)?,
    ))
}

pub fn connected(wallet: &WalletAddress) -> OutwardMessage {
    OutwardMessage::new(
        MessageKind::Connected,
        json!({
            "wallet": wallet,
            "message": "Connected to order stream",
        }),
    )
}

pub fn subscribed(subscription_id: &str, wallet: &WalletAddress) -> OutwardMessage {
    OutwardMessage::new(
        MessageKind::Subscribed,
        json!({
            "subscription_id": subscription_id,
            "wallet": wallet,
        }),
    )
}

pub fn disconnected() -> OutwardMessage {
    OutwardMessage::new(
        MessageKind::Disconnected,
        json!({ "message": "Upstream connection lost, reconnecting" }),
    )
}

pub fn error(message: &str) -> OutwardMessage {
    OutwardMessage::new(MessageKind::Error, json!({ "message": message }))
}

pub fn heartbeat() -> OutwardMessage {
    OutwardMessage::new(MessageKind::Heartbeat, json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyterm_core::OrderSide;
    use rust_decimal_macros::dec;

    const WALLET: &str = "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee";

    fn sample_order() -> OrderEvent {
        OrderEvent {
            token_id: "5713257839212348928".to_string(),
            side: OrderSide::Sell,
            market_slug: "fed-cuts-rates-in-march".to_string(),
            condition_id: "0xabc".to_string(),
            shares: dec!(12500000),
            shares_normalized: dec!(12.5),
            price: dec!(0.42),
            tx_hash: "0xdead".to_string(),
            title: "Fed cuts rates in March?".to_string(),
            timestamp: 1_717_000_000,
            order_hash: "0xbeef".to_string(),
            user: WALLET.to_string(),
        }
    }

    #[test]
    fn test_order_payload_fields() {
        let message = order(&sample_order()).unwrap();
        assert_eq!(message.kind, MessageKind::Order);

        let data = message.data.as_object().unwrap();
        let mut keys: Vec<&str> = data.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "condition_id",
                "market_slug",
                "order_hash",
                "price",
                "shares",
                "shares_normalized",
                "side",
                "timestamp",
                "title",
                "token_id",
                "tx_hash",
                "user",
            ]
        );
        assert_eq!(data["side"], "SELL");
        assert_eq!(data["price"], 0.42);
        assert_eq!(data["shares_normalized"], 12.5);
        assert_eq!(data["timestamp"], 1_717_000_000);
    }

    #[test]
    fn test_lifecycle_messages() {
        let wallet = WalletAddress::parse(WALLET).unwrap();

        let msg = connected(&wallet);
        assert_eq!(msg.kind, MessageKind::Connected);
        assert_eq!(msg.data["wallet"], WALLET);

        let msg = subscribed("sub_1", &wallet);
        assert_eq!(msg.data["subscription_id"], "sub_1");

        assert_eq!(disconnected().kind, MessageKind::Disconnected);
        assert_eq!(error("boom").data["message"], "boom");
        assert_eq!(heartbeat().data, json!({}));
    }

    #[test]
    fn test_wire_shape() {
        let json = heartbeat().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert!(value["timestamp"].is_string());
        assert!(value.get("data").is_some());
    }
}
