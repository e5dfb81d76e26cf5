//! Order feed abstraction.
//!
//! Sessions talk to the upstream service through `OrderFeed`, and obtain a
//! fresh feed per session from a `FeedConnector`. This allows:
//! - Unit testing sessions with `MockFeedConnector`
//! - Swapping the transport without touching session logic

use crate::connection::{UpstreamClient, UpstreamConfig};
use crate::error::WsResult;
use crate::event::UpstreamEvent;
use polyterm_core::WalletAddress;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One upstream push subscription owned by one session.
pub trait OrderFeed: Send + Sync {
    /// Start the transport. Lifecycle is reported through the event channel
    /// the feed was opened with.
    fn connect(&self) -> WsResult<()>;

    /// Subscribe to order events for one wallet.
    ///
    /// Resolves to the upstream-assigned subscription id.
    fn subscribe<'a>(&'a self, wallet: &'a WalletAddress) -> BoxFuture<'a, WsResult<String>>;

    /// Tear down the transport. Idempotent; no event is delivered after the
    /// returned future completes.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Factory for per-session feeds.
pub trait FeedConnector: Send + Sync {
    /// Create an unconnected feed that reports into `events`.
    fn open(&self, events: mpsc::Sender<UpstreamEvent>) -> Arc<dyn OrderFeed>;
}

/// Arc wrapper for FeedConnector trait objects.
pub type DynFeedConnector = Arc<dyn FeedConnector>;

/// Connector producing WebSocket-backed feeds.
#[derive(Debug, Clone)]
pub struct WsFeedConnector {
    config: UpstreamConfig,
}

impl WsFeedConnector {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }
}

impl FeedConnector for WsFeedConnector {
    fn open(&self, events: mpsc::Sender<UpstreamEvent>) -> Arc<dyn OrderFeed> {
        Arc::new(UpstreamClient::new(self.config.clone(), events))
    }
}
