//! Upstream order-feed client for polyterm.
//!
//! Provides the push connection that backs every wallet stream:
//! - Automatic reconnection with a fixed delay and bounded attempts
//! - Wallet subscription with ack tracking and restoration after reconnect
//! - Lifecycle and order notifications on a single ordered channel
//! - Idempotent, cancellation-aware shutdown

pub mod connection;
pub mod error;
pub mod event;
pub mod feed;
pub mod message;
pub mod mock;

pub use connection::{ConnectionState, UpstreamClient, UpstreamConfig};
pub use error::{WsError, WsResult};
pub use event::{ErrorSeverity, UpstreamError, UpstreamEvent};
pub use feed::{BoxFuture, DynFeedConnector, FeedConnector, OrderFeed, WsFeedConnector};
pub use message::{SubscribeRequest, UnsubscribeRequest, UpstreamMessage};
pub use mock::{MockFeed, MockFeedConnector, MockSubscribe};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any upstream connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
