//! Upstream connection manager.
//!
//! Handles the lifecycle of one push connection to the order-event service:
//! automatic reconnection with a fixed delay and a bounded attempt count,
//! subscription restoration after reconnection, and cancellation-aware
//! shutdown.

use crate::error::{WsError, WsResult};
use crate::event::{UpstreamError, UpstreamEvent};
use crate::feed::{BoxFuture, OrderFeed};
use crate::message::{SubscribeRequest, UnsubscribeRequest, UpstreamMessage};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use polyterm_core::WalletAddress;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long `close()` waits for the connection task before aborting it.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Budget for the unsubscribe + Close frame sent on shutdown.
const GOODBYE_TIMEOUT: Duration = Duration::from_millis(500);

/// Queued commands per client.
const COMMAND_BUFFER: usize = 8;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;

/// Upstream connection configuration.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// WebSocket base URL; the API key is appended as the last path segment.
    pub url: String,
    /// API key for the push service.
    pub api_key: String,
    /// Market platform sent with subscriptions.
    pub platform: String,
    /// Maximum consecutive reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay_ms: u64,
    /// How long a subscribe may wait for its ack.
    pub subscribe_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "wss://ws.domeapi.io".to_string(),
            api_key: String::new(),
            platform: "polymarket".to_string(),
            max_reconnect_attempts: 10,
            reconnect_delay_ms: 5000,
            subscribe_timeout_ms: 10_000,
        }
    }
}

impl UpstreamConfig {
    /// Full connection URL including the API key.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), self.api_key)
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("platform", &self.platform)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("subscribe_timeout_ms", &self.subscribe_timeout_ms)
            .finish()
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

enum Command {
    Subscribe {
        wallet: WalletAddress,
        reply: oneshot::Sender<WsResult<String>>,
    },
}

/// Subscribe request sent but not yet acknowledged.
struct PendingSubscribe {
    wallet: WalletAddress,
    /// `None` when the request restores a subscription after reconnect.
    reply: Option<oneshot::Sender<WsResult<String>>>,
}

#[derive(Default)]
struct SubscriptionState {
    /// Wallet to (re)subscribe on every connect.
    wallet: Option<WalletAddress>,
    /// Id from the latest ack on the current link.
    subscription_id: Option<String>,
}

/// State shared between the client handle and its connection task.
struct Shared {
    config: UpstreamConfig,
    state: RwLock<ConnectionState>,
    subscription: RwLock<SubscriptionState>,
    reconnect_count: RwLock<u32>,
    events: mpsc::Sender<UpstreamEvent>,
    shutdown_token: CancellationToken,
}

/// Reconnecting upstream client for one wallet subscription.
pub struct UpstreamClient {
    shared: Arc<Shared>,
    command_tx: mpsc::Sender<Command>,
    /// Taken by the connection task on `connect()`.
    command_rx: Mutex<Option<mpsc::Receiver<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl UpstreamClient {
    /// Create a new client. Nothing happens until `connect()`.
    pub fn new(config: UpstreamConfig, events: mpsc::Sender<UpstreamEvent>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        Self {
            shared: Arc::new(Shared {
                config,
                state: RwLock::new(ConnectionState::Disconnected),
                subscription: RwLock::new(SubscriptionState::default()),
                reconnect_count: RwLock::new(0),
                events,
                shutdown_token: CancellationToken::new(),
            }),
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            task: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Subscription id from the latest ack, if the link is subscribed.
    pub fn subscription_id(&self) -> Option<String> {
        self.shared.subscription.read().subscription_id.clone()
    }

    /// Consecutive reconnection attempts since the last successful connect.
    pub fn reconnect_count(&self) -> u32 {
        *self.shared.reconnect_count.read()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Spawn the connection task. Calling it again is a no-op.
    pub fn connect(&self) -> WsResult<()> {
        if self.is_closed() {
            return Err(WsError::Closed);
        }

        let Some(commands) = self.command_rx.lock().take() else {
            debug!("Upstream connection task already running");
            return Ok(());
        };

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move { shared.run(commands).await });
        *self.task.lock() = Some(handle);
        Ok(())
    }

    /// Subscribe to order events for `wallet` and wait for the ack.
    pub async fn subscribe(&self, wallet: &WalletAddress) -> WsResult<String> {
        if self.is_closed() {
            return Err(WsError::Closed);
        }

        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Subscribe {
                wallet: wallet.clone(),
                reply,
            })
            .await
            .map_err(|_| WsError::SendFailed("connection task is not running".to_string()))?;

        let timeout_ms = self.shared.config.subscribe_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(WsError::SubscriptionError(
                "connection lost before acknowledgement".to_string(),
            )),
            Err(_) => Err(WsError::SubscribeTimeout(timeout_ms)),
        }
    }

    /// Stop the connection task and wait for it to exit.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Upstream client close requested");
        self.shared.shutdown_token.cancel();

        let handle = self.task.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut handle).await.is_err() {
                warn!("Upstream connection task did not stop in time, aborting");
                handle.abort();
            }
        }

        *self.shared.state.write() = ConnectionState::Disconnected;
    }
}

impl Drop for UpstreamClient {
    fn drop(&mut self) {
        self.shared.shutdown_token.cancel();
    }
}

impl OrderFeed for UpstreamClient {
    fn connect(&self) -> WsResult<()> {
        UpstreamClient::connect(self)
    }

    fn subscribe<'a>(&'a self, wallet: &'a WalletAddress) -> BoxFuture<'a, WsResult<String>> {
        Box::pin(UpstreamClient::subscribe(self, wallet))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(UpstreamClient::close(self))
    }
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Deliver an event to the owner. Returns false once shut down.
    async fn emit(&self, event: UpstreamEvent) -> bool {
        if self.is_shutdown() {
            return false;
        }

        let label = event.label();
        tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => false,
            result = self.events.send(event) => {
                if result.is_err() {
                    warn!(event = label, "Event receiver dropped, stopping upstream client");
                    self.shutdown_token.cancel();
                    return false;
                }
                true
            }
        }
    }

    async fn run(self: Arc<Self>, mut commands: mpsc::Receiver<Command>) {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting upstream connect loop");
                self.set_state(ConnectionState::Disconnected);
                return;
            }

            self.set_state(ConnectionState::Connecting);

            let result = self.try_connect(&mut commands).await;
            let was_open = self.state() == ConnectionState::Connected;

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(ConnectionState::Disconnected);
                return;
            }

            match result {
                Ok(()) => info!("Upstream connection closed"),
                Err(e) => error!(error = %e, "Upstream connection error"),
            }

            if was_open {
                attempt = 0;
                self.subscription.write().subscription_id = None;
                if !self.emit(UpstreamEvent::Closed).await {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            }

            attempt += 1;
            *self.reconnect_count.write() = attempt;

            let max_attempts = self.config.max_reconnect_attempts;
            if max_attempts > 0 && attempt > max_attempts {
                error!(attempt, "Max reconnection attempts reached");
                self.set_state(ConnectionState::Disconnected);
                self.emit(UpstreamEvent::Error(UpstreamError::fatal(format!(
                    "Upstream connection lost after {max_attempts} reconnection attempts"
                ))))
                .await;
                return;
            }

            self.set_state(ConnectionState::Reconnecting);

            let delay = Duration::from_millis(self.config.reconnect_delay_ms);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting upstream");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during reconnect delay, exiting");
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            }
        }
    }

    async fn try_connect(&self, commands: &mut mpsc::Receiver<Command>) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to upstream feed");

        let (ws_stream, _response) = tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => return Ok(()),
            result = connect_async_tls_with_config(self.config.endpoint(), None, true, None) => result?,
        };
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Connected);
        *self.reconnect_count.write() = 0;
        info!("Upstream feed connected");

        if !self.emit(UpstreamEvent::Open).await {
            return Ok(());
        }

        let mut pending: Option<PendingSubscribe> = None;

        let restore = self.subscription.read().wallet.clone();
        if let Some(wallet) = restore {
            info!(wallet = %wallet, "Restoring wallet subscription");
            self.send_subscribe(&mut write, &wallet).await?;
            pending = Some(PendingSubscribe {
                wallet,
                reply: None,
            });
        }

        loop {
            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in upstream message loop");
                    self.say_goodbye(&mut write).await;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text, &mut pending).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Upstream closed the connection");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "Upstream read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Upstream stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                command = commands.recv() => {
                    match command {
                        Some(Command::Subscribe { wallet, reply }) => {
                            self.subscription.write().wallet = Some(wallet.clone());
                            if let Err(e) = self.send_subscribe(&mut write, &wallet).await {
                                let _ = reply.send(Err(WsError::SendFailed(e.to_string())));
                                return Err(e);
                            }
                            pending = Some(PendingSubscribe {
                                wallet,
                                reply: Some(reply),
                            });
                        }
                        None => {
                            debug!("Command channel closed, stopping upstream client");
                            self.shutdown_token.cancel();
                        }
                    }
                }
            }
        }
    }

    async fn handle_text_message(&self, text: &str, pending: &mut Option<PendingSubscribe>) {
        let msg = match UpstreamMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Failed to parse upstream message");
                let err = WsError::ParseError(e.to_string());
                self.emit(UpstreamEvent::Error(UpstreamError::recoverable(
                    err.user_message(),
                )))
                .await;
                return;
            }
        };

        match msg {
            UpstreamMessage::Ack { subscription_id } => {
                let Some(acked) = pending.take() else {
                    debug!(%subscription_id, "Ignoring unsolicited subscription ack");
                    return;
                };
                self.subscription.write().subscription_id = Some(subscription_id.clone());
                info!(wallet = %acked.wallet, %subscription_id, "Subscription acknowledged");
                if let Some(reply) = acked.reply {
                    let _ = reply.send(Ok(subscription_id));
                }
            }
            UpstreamMessage::Event { data, .. } => {
                self.emit(UpstreamEvent::Order(Box::new(data))).await;
            }
            UpstreamMessage::Error { message } => {
                let message = if message.is_empty() {
                    "Upstream reported an error".to_string()
                } else {
                    message
                };
                warn!(%message, "Upstream reported error");

                match pending.take() {
                    Some(PendingSubscribe {
                        reply: Some(reply),
                        ..
                    }) => {
                        let _ = reply.send(Err(WsError::SubscriptionError(message)));
                    }
                    other => {
                        *pending = other;
                        self.emit(UpstreamEvent::Error(UpstreamError::recoverable(message)))
                            .await;
                    }
                }
            }
            UpstreamMessage::Unknown => {
                debug!("Ignoring upstream message of unknown type");
            }
        }
    }

    async fn send_subscribe(&self, write: &mut WsSink, wallet: &WalletAddress) -> WsResult<()> {
        let request = SubscribeRequest::orders_for(self.config.platform.clone(), wallet);
        let text = serde_json::to_string(&request)?;
        write.send(Message::Text(text)).await?;
        debug!(wallet = %wallet, "Subscribe request sent");
        Ok(())
    }

    /// Best-effort unsubscribe and Close frame before dropping the socket.
    async fn say_goodbye(&self, write: &mut WsSink) {
        let subscription_id = self.subscription.read().subscription_id.clone();

        let goodbye = async {
            if let Some(id) = subscription_id {
                match serde_json::to_string(&UnsubscribeRequest::new(id)) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            warn!(?e, "Failed to send unsubscribe during shutdown");
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to encode unsubscribe request"),
                }
            }
            if let Err(e) = write.send(Message::Close(None)).await {
                warn!(?e, "Failed to send Close frame during shutdown");
            }
        };

        if tokio::time::timeout(GOODBYE_TIMEOUT, goodbye).await.is_err() {
            warn!("Timed out sending unsubscribe/close upstream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UpstreamConfig::default();
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.reconnect_delay_ms, 5000);
        assert_eq!(config.platform, "polymarket");
    }

    #[test]
    fn test_endpoint_appends_api_key() {
        let config = UpstreamConfig {
            url: "wss://feed.example.com/".to_string(),
            api_key: "secret".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "wss://feed.example.com/secret");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = UpstreamConfig {
            api_key: "super-secret-key".to_string(),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_further_use() {
        let (tx, _rx) = mpsc::channel(8);
        let client = UpstreamClient::new(UpstreamConfig::default(), tx);

        client.close().await;
        client.close().await;

        assert!(client.is_closed());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(client.connect(), Err(WsError::Closed)));

        let wallet = WalletAddress::parse("0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee").unwrap();
        assert!(matches!(client.subscribe(&wallet).await, Err(WsError::Closed)));
    }

    #[tokio::test]
    async fn test_subscribe_times_out_without_connection() {
        let (tx, _rx) = mpsc::channel(8);
        let config = UpstreamConfig {
            subscribe_timeout_ms: 50,
            ..Default::default()
        };
        let client = UpstreamClient::new(config, tx);
        let wallet = WalletAddress::parse("0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee").unwrap();

        let result = client.subscribe(&wallet).await;
        assert!(matches!(result, Err(WsError::SubscribeTimeout(50))));
    }
}
