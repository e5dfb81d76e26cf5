//! Shared helpers for gateway integration tests.

#![allow(dead_code)]

use polyterm_core::{OrderEvent, OrderSide, WalletAddress};
use rust_decimal_macros::dec;
use std::time::Duration;

pub const WALLET: &str = "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee";

pub fn wallet() -> WalletAddress {
    WalletAddress::parse(WALLET).unwrap()
}

pub fn order(token_id: &str) -> OrderEvent {
    OrderEvent {
        token_id: token_id.to_string(),
        side: OrderSide::Buy,
        market_slug: "btc-above-100k".to_string(),
        condition_id: "0xcond".to_string(),
        shares: dec!(5000000),
        shares_normalized: dec!(5),
        price: dec!(0.5),
        tx_hash: format!("0xtx{token_id}"),
        title: "BTC above 100k?".to_string(),
        timestamp: 1_717_000_000,
        order_hash: format!("0xhash{token_id}"),
        user: WALLET.to_string(),
    }
}

/// Poll `condition` until it holds.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition reached");
}
