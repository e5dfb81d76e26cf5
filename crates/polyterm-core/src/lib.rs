//! Core domain types for the polyterm wallet-activity gateway.
//!
//! This crate provides the types shared by the upstream client and the
//! streaming gateway:
//! - `WalletAddress`: Validated, lower-cased `0x` address
//! - `OrderEvent`: Canonical order record pushed by the upstream feed
//! - `OutwardMessage`: Tagged message written to downstream streams

pub mod error;
pub mod message;
pub mod order;
pub mod wallet;

pub use error::{CoreError, Result};
pub use message::{MessageKind, OutwardMessage};
pub use order::{OrderEvent, OrderSide};
pub use wallet::WalletAddress;
