//! Order event types.
//!
//! `OrderEvent` is the canonical order record pushed by the upstream feed
//! for a tracked wallet. It is constructed once per upstream notification
//! and never mutated.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    #[serde(rename = "BUY", alias = "buy", alias = "Buy")]
    Buy,
    #[serde(rename = "SELL", alias = "sell", alias = "Sell")]
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Canonical order record for one upstream notification.
///
/// Numeric fields are carried as JSON numbers on both the upstream and the
/// downstream side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Outcome token identifier.
    pub token_id: String,
    /// Order side.
    pub side: OrderSide,
    /// Market slug (e.g., "will-btc-close-above-100k").
    pub market_slug: String,
    /// Condition identifier (0x-prefixed hash).
    pub condition_id: String,
    /// Raw share count in base units.
    #[serde(with = "rust_decimal::serde::float")]
    pub shares: Decimal,
    /// Share count normalized to whole shares.
    #[serde(with = "rust_decimal::serde::float")]
    pub shares_normalized: Decimal,
    /// Fill price in the unit interval.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Settlement transaction hash.
    pub tx_hash: String,
    /// Market display title.
    #[serde(default)]
    pub title: String,
    /// Upstream timestamp (Unix seconds).
    pub timestamp: i64,
    /// Order hash.
    pub order_hash: String,
    /// Address of the user that placed the order.
    pub user: String,
}
