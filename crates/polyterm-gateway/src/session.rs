//! Per-stream session.
//!
//! A `StreamSession` owns one upstream feed, one heartbeat timer, and the
//! sending half of its downstream channel. One task drives the session
//! through `Opening -> Subscribed -> Streaming`; any state can move to
//! `Closed`, either on downstream cancellation or on a fatal upstream error.
//!
//! # Teardown
//!
//! Two flags guard the session:
//! - `closed` is set first and is checked right before every outward write,
//!   so nothing is written once cancellation is observed.
//! - `torn_down` makes `close` run its body exactly once, no matter how many
//!   triggers race (client disconnect, fatal error, shutdown drain).

use crate::limiter::SessionPermit;
use crate::registry::SessionRegistry;
use crate::translator;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use polyterm_core::{OutwardMessage, WalletAddress};
use polyterm_telemetry::Metrics;
use polyterm_ws::{FeedConnector, OrderFeed, UpstreamError, UpstreamEvent};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

static NEXT_SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Session identifier: wallet, creation millis, and a process-wide sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(wallet: &WalletAddress, created_at: DateTime<Utc>) -> Self {
        let seq = NEXT_SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "{}-{}-{}",
            wallet,
            created_at.timestamp_millis(),
            seq
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the upstream link and the subscribe ack.
    Opening,
    /// Subscription acknowledged.
    Subscribed,
    /// Registered, heartbeat running.
    Streaming,
    Closed,
}

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Downstream stream was dropped.
    ClientDisconnected,
    /// Initial subscribe failed or timed out.
    SubscribeFailed,
    /// Upstream gave up (connect failure or reconnects exhausted).
    UpstreamFatal,
    /// Process shutdown drain.
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientDisconnected => "client_disconnected",
            Self::SubscribeFailed => "subscribe_failed",
            Self::UpstreamFatal => "upstream_fatal",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub heartbeat_interval: Duration,
    /// Outward messages buffered before writes wait on the client.
    pub channel_capacity: usize,
    /// Upstream events buffered before the feed waits on the session.
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            channel_capacity: 256,
            event_capacity: 256,
        }
    }
}

/// Introspection view of a live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub wallet: WalletAddress,
    pub subscription_id: Option<String>,
    pub opened_at: DateTime<Utc>,
}

/// State for one downstream stream.
pub struct StreamSession {
    id: SessionId,
    wallet: WalletAddress,
    opened_at: DateTime<Utc>,
    feed: Arc<dyn OrderFeed>,
    registry: SessionRegistry,
    heartbeat_interval: Duration,
    out: Mutex<Option<mpsc::Sender<OutwardMessage>>>,
    subscription_id: RwLock<Option<String>>,
    state: RwLock<SessionState>,
    closed: AtomicBool,
    torn_down: AtomicBool,
    cancel_token: CancellationToken,
    permit: Mutex<Option<SessionPermit>>,
}

impl StreamSession {
    /// Create a session and spawn the task that drives it.
    ///
    /// Returns the session and the receiving half of its outward channel.
    /// The channel ends once the session is closed.
    pub fn start(
        wallet: WalletAddress,
        connector: &dyn FeedConnector,
        registry: SessionRegistry,
        options: &SessionOptions,
        permit: Option<SessionPermit>,
    ) -> (Arc<Self>, mpsc::Receiver<OutwardMessage>) {
        let (out_tx, out_rx) = mpsc::channel(options.channel_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(options.event_capacity.max(1));
        let feed = connector.open(event_tx);
        let opened_at = Utc::now();

        let session = Arc::new(Self {
            id: SessionId::new(&wallet, opened_at),
            wallet,
            opened_at,
            feed,
            registry,
            heartbeat_interval: options.heartbeat_interval,
            out: Mutex::new(Some(out_tx)),
            subscription_id: RwLock::new(None),
            state: RwLock::new(SessionState::Opening),
            closed: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
            permit: Mutex::new(permit),
        });

        tokio::spawn(Arc::clone(&session).run(event_rx));
        (session, out_rx)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn wallet(&self) -> &WalletAddress {
        &self.wallet
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Upstream-assigned subscription id, once acknowledged.
    pub fn subscription_id(&self) -> Option<String> {
        self.subscription_id.read().clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            wallet: self.wallet.clone(),
            subscription_id: self.subscription_id(),
            opened_at: self.opened_at,
        }
    }

    /// Downstream cancellation signal.
    ///
    /// Stops outward writes immediately. The driving task then performs the
    /// teardown.
    pub fn cancel(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel_token.cancel();
    }

    /// Tear the session down.
    ///
    /// Returns true for the call that performed teardown, false for every
    /// later call.
    pub async fn close(&self, reason: CloseReason) -> bool {
        self.closed.store(true, Ordering::SeqCst);
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.cancel_token.cancel();
        self.set_state(SessionState::Closed);
        self.out.lock().take();

        // Evict before the upstream goodbye, which may take seconds.
        let evicted = self.registry.remove(&self.id);
        if evicted {
            Metrics::session_closed(reason.as_str());
        } else {
            Metrics::session_aborted(reason.as_str());
        }

        self.feed.close().await;
        self.permit.lock().take();

        info!(
            session_id = %self.id,
            wallet = %self.wallet,
            reason = reason.as_str(),
            evicted,
            "Session closed"
        );
        true
    }

    async fn run(self: Arc<Self>, mut events: mpsc::Receiver<UpstreamEvent>) {
        debug!(session_id = %self.id, wallet = %self.wallet, "Session started");
        let reason = self.drive(&mut events).await;
        self.close(reason).await;
    }

    async fn drive(self: &Arc<Self>, events: &mut mpsc::Receiver<UpstreamEvent>) -> CloseReason {
        if let Err(e) = self.feed.connect() {
            warn!(session_id = %self.id, error = %e, "Upstream connect failed");
            Metrics::upstream_error("fatal");
            self.emit(translator::error(&e.user_message())).await;
            return CloseReason::UpstreamFatal;
        }

        // Opening: wait for the link.
        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => return CloseReason::ClientDisconnected,

                event = events.recv() => match event {
                    Some(UpstreamEvent::Open) => break,
                    Some(UpstreamEvent::Error(err)) => {
                        if let Some(reason) = self.on_error(err).await {
                            return reason;
                        }
                    }
                    Some(other) => {
                        debug!(session_id = %self.id, event = other.label(), "Ignoring event before open");
                    }
                    None => return CloseReason::UpstreamFatal,
                },
            }
        }
        self.emit(translator::connected(&self.wallet)).await;

        // Subscribe. Events arriving meanwhile are replayed after `subscribed`.
        let mut pending = VecDeque::new();
        let mut subscribe = self.feed.subscribe(&self.wallet);
        let subscription_id = loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => return CloseReason::ClientDisconnected,

                result = &mut subscribe => match result {
                    Ok(id) => break id,
                    Err(e) => {
                        warn!(session_id = %self.id, wallet = %self.wallet, error = %e, "Subscribe failed");
                        Metrics::upstream_error("fatal");
                        self.emit(translator::error(&e.user_message())).await;
                        return CloseReason::SubscribeFailed;
                    }
                },

                event = events.recv() => match event {
                    Some(event) => pending.push_back(event),
                    None => return CloseReason::UpstreamFatal,
                },
            }
        };
        drop(subscribe);

        *self.subscription_id.write() = Some(subscription_id.clone());
        self.set_state(SessionState::Subscribed);
        self.emit(translator::subscribed(&subscription_id, &self.wallet))
            .await;

        self.register(&subscription_id);

        let period = self.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for event in pending {
            if let Some(reason) = self.on_event(event).await {
                return reason;
            }
        }

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => return CloseReason::ClientDisconnected,

                event = events.recv() => match event {
                    Some(event) => {
                        if let Some(reason) = self.on_event(event).await {
                            return reason;
                        }
                    }
                    None => return CloseReason::UpstreamFatal,
                },

                _ = heartbeat.tick() => {
                    self.emit(translator::heartbeat()).await;
                }
            }
        }
    }

    /// Enter `Streaming` and make the session visible in the registry.
    fn register(self: &Arc<Self>, subscription_id: &str) {
        self.set_state(SessionState::Streaming);
        self.registry.insert(Arc::clone(self));

        // A close that ran before the insert could not evict us.
        if self.torn_down.load(Ordering::SeqCst) {
            self.registry.remove(&self.id);
            return;
        }

        Metrics::session_opened();
        info!(
            session_id = %self.id,
            wallet = %self.wallet,
            subscription_id,
            sessions = self.registry.len(),
            "Session streaming"
        );
    }

    async fn on_event(&self, event: UpstreamEvent) -> Option<CloseReason> {
        match event {
            UpstreamEvent::Open => {
                self.emit(translator::connected(&self.wallet)).await;
                None
            }
            UpstreamEvent::Closed => {
                info!(session_id = %self.id, "Upstream link down");
                Metrics::upstream_reconnect();
                self.emit(translator::disconnected()).await;
                None
            }
            UpstreamEvent::Error(err) => self.on_error(err).await,
            UpstreamEvent::Order(order) => {
                match translator::order(&order) {
                    Ok(message) => {
                        self.emit(message).await;
                    }
                    Err(e) => {
                        warn!(session_id = %self.id, error = %e, "Failed to serialize order");
                        Metrics::message_dropped("order");
                    }
                }
                None
            }
        }
    }

    async fn on_error(&self, err: UpstreamError) -> Option<CloseReason> {
        if err.is_fatal() {
            warn!(session_id = %self.id, error = %err, "Fatal upstream error");
            Metrics::upstream_error("fatal");
        } else {
            debug!(session_id = %self.id, error = %err, "Upstream error");
            Metrics::upstream_error("recoverable");
        }
        self.emit(translator::error(&err.message)).await;
        err.is_fatal().then_some(CloseReason::UpstreamFatal)
    }

    /// Write one message downstream unless the session is closed.
    async fn emit(&self, message: OutwardMessage) -> bool {
        let kind = message.kind.as_str();
        let out = self.out.lock().clone();

        let Some(out) = out.filter(|_| !self.is_closed()) else {
            Metrics::message_dropped(kind);
            return false;
        };

        tokio::select! {
            biased;

            _ = self.cancel_token.cancelled() => {
                Metrics::message_dropped(kind);
                false
            }

            result = out.send(message) => match result {
                Ok(()) => {
                    Metrics::message_sent(kind);
                    true
                }
                Err(_) => {
                    Metrics::message_dropped(kind);
                    false
                }
            },
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }
}
