//! In-memory order feed for testing session logic without a network.

use crate::error::{WsError, WsResult};
use crate::event::UpstreamEvent;
use crate::feed::{BoxFuture, FeedConnector, OrderFeed};
use parking_lot::Mutex;
use polyterm_core::WalletAddress;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How a mock feed answers `subscribe`.
#[derive(Debug, Clone)]
pub enum MockSubscribe {
    /// Acknowledge with this subscription id.
    Ack(String),
    /// Fail with a subscription error carrying this reason.
    Fail(String),
    /// Never resolve.
    Hang,
}

/// Mock feed that records calls and lets tests inject events.
#[derive(Debug)]
pub struct MockFeed {
    events: mpsc::Sender<UpstreamEvent>,
    behavior: MockSubscribe,
    open_on_connect: bool,
    close_delay: Duration,
    subscriptions: Mutex<Vec<WalletAddress>>,
    connect_calls: AtomicUsize,
    close_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MockFeed {
    pub fn new(
        events: mpsc::Sender<UpstreamEvent>,
        behavior: MockSubscribe,
        open_on_connect: bool,
    ) -> Self {
        Self {
            events,
            behavior,
            open_on_connect,
            close_delay: Duration::ZERO,
            subscriptions: Mutex::new(Vec::new()),
            connect_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Make `close` take this long to resolve, like a real socket
    /// flushing its goodbye frames.
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Inject an event as if it came from upstream.
    ///
    /// Returns false if the feed is closed or the receiver is gone.
    pub async fn emit(&self, event: UpstreamEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        self.events.send(event).await.is_ok()
    }

    /// Wallets passed to `subscribe`, in call order.
    pub fn subscriptions(&self) -> Vec<WalletAddress> {
        self.subscriptions.lock().clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of times `close` was invoked.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl OrderFeed for MockFeed {
    fn connect(&self) -> WsResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(WsError::Closed);
        }
        if self.open_on_connect {
            self.events
                .try_send(UpstreamEvent::Open)
                .map_err(|e| WsError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn subscribe<'a>(&'a self, wallet: &'a WalletAddress) -> BoxFuture<'a, WsResult<String>> {
        Box::pin(async move {
            self.subscriptions.lock().push(wallet.clone());
            match &self.behavior {
                MockSubscribe::Ack(id) => Ok(id.clone()),
                MockSubscribe::Fail(reason) => Err(WsError::SubscriptionError(reason.clone())),
                MockSubscribe::Hang => std::future::pending().await,
            }
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
            if !self.close_delay.is_zero() {
                tokio::time::sleep(self.close_delay).await;
            }
        })
    }
}

/// Connector handing out `MockFeed`s and keeping them for inspection.
#[derive(Debug)]
pub struct MockFeedConnector {
    behavior: MockSubscribe,
    open_on_connect: bool,
    close_delay: Duration,
    feeds: Mutex<Vec<Arc<MockFeed>>>,
}

impl Default for MockFeedConnector {
    fn default() -> Self {
        Self::new(MockSubscribe::Ack("sub_mock".to_string()))
    }
}

impl MockFeedConnector {
    pub fn new(behavior: MockSubscribe) -> Self {
        Self {
            behavior,
            open_on_connect: true,
            close_delay: Duration::ZERO,
            feeds: Mutex::new(Vec::new()),
        }
    }

    /// Do not emit `Open` on connect; tests drive it by hand.
    pub fn without_auto_open(mut self) -> Self {
        self.open_on_connect = false;
        self
    }

    /// Feeds handed out take `delay` to close.
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Most recently opened feed.
    pub fn last_feed(&self) -> Option<Arc<MockFeed>> {
        self.feeds.lock().last().cloned()
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.lock().len()
    }
}

impl FeedConnector for MockFeedConnector {
    fn open(&self, events: mpsc::Sender<UpstreamEvent>) -> Arc<dyn OrderFeed> {
        let feed = Arc::new(
            MockFeed::new(events, self.behavior.clone(), self.open_on_connect)
                .with_close_delay(self.close_delay),
        );
        self.feeds.lock().push(feed.clone());
        feed
    }
}
