//! Prometheus metrics for the polyterm gateway.
//!
//! Covers:
//! - Live stream sessions and why they ended
//! - Outward messages written or dropped after close
//! - Upstream reconnects and errors
//! - Collaborator dispatch attempts and retries
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error surfaced on first use.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Sessions currently registered.
pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("polyterm_active_sessions", "Live wallet stream sessions").unwrap()
});

/// Sessions opened.
pub static SESSIONS_OPENED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "polyterm_sessions_opened_total",
        "Total wallet stream sessions opened"
    )
    .unwrap()
});

/// Sessions closed.
/// Labels: reason (client_disconnected/subscribe_failed/upstream_fatal/shutdown)
pub static SESSIONS_CLOSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "polyterm_sessions_closed_total",
        "Total wallet stream sessions closed",
        &["reason"]
    )
    .unwrap()
});

/// Outward messages written to clients.
pub static OUTWARD_MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "polyterm_outward_messages_total",
        "Total messages written to stream clients",
        &["type"]
    )
    .unwrap()
});

/// Outward messages discarded because the session was closed.
pub static DROPPED_MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "polyterm_dropped_messages_total",
        "Messages produced after session close and discarded",
        &["type"]
    )
    .unwrap()
});

pub static UPSTREAM_RECONNECT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "polyterm_upstream_reconnect_total",
        "Upstream connection drops observed by sessions"
    )
    .unwrap()
});

/// Upstream errors.
/// Labels: severity (recoverable/fatal)
pub static UPSTREAM_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "polyterm_upstream_errors_total",
        "Upstream errors surfaced to sessions",
        &["severity"]
    )
    .unwrap()
});

/// Dispatch attempts, including the first.
/// Labels: route (orders/claim)
pub static DISPATCH_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "polyterm_dispatch_attempts_total",
        "Total collaborator request attempts",
        &["route"]
    )
    .unwrap()
});

pub static DISPATCH_RETRIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "polyterm_dispatch_retries_total",
        "Collaborator requests that needed at least one retry",
        &["route"]
    )
    .unwrap()
});

/// Dispatch failures.
/// Labels: route, kind (non_json/transport)
pub static DISPATCH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "polyterm_dispatch_failures_total",
        "Collaborator requests that did not yield JSON",
        &["route", "kind"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a session registered and streaming.
    pub fn session_opened() {
        SESSIONS_OPENED_TOTAL.inc();
        ACTIVE_SESSIONS.inc();
    }

    /// Record a registered session removed.
    pub fn session_closed(reason: &str) {
        SESSIONS_CLOSED_TOTAL.with_label_values(&[reason]).inc();
        ACTIVE_SESSIONS.dec();
    }

    /// Record a session that ended before it was registered.
    pub fn session_aborted(reason: &str) {
        SESSIONS_CLOSED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn message_sent(kind: &str) {
        OUTWARD_MESSAGES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn message_dropped(kind: &str) {
        DROPPED_MESSAGES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn upstream_reconnect() {
        UPSTREAM_RECONNECT_TOTAL.inc();
    }

    pub fn upstream_error(severity: &str) {
        UPSTREAM_ERRORS_TOTAL.with_label_values(&[severity]).inc();
    }

    /// Record a finished dispatch.
    pub fn dispatch(route: &str, attempts: u32, is_retry: bool) {
        DISPATCH_ATTEMPTS_TOTAL
            .with_label_values(&[route])
            .inc_by(u64::from(attempts));
        if is_retry {
            DISPATCH_RETRIES_TOTAL.with_label_values(&[route]).inc();
        }
    }

    pub fn dispatch_failed(route: &str, kind: &str) {
        DISPATCH_FAILURES_TOTAL
            .with_label_values(&[route, kind])
            .inc();
    }

    /// Render the default registry in the text exposition format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
