//! Events delivered from an upstream client to its owner.
//!
//! Lifecycle signals and order notifications share one ordered channel, so
//! the consumer observes them exactly in the order the connection task
//! produced them.

use polyterm_core::OrderEvent;
use std::fmt;

/// How an upstream error affects the consuming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Reported in-stream; the link stays up or recovers on its own.
    Recoverable,
    /// The client has given up; the consuming session must close.
    Fatal,
}

/// Human-readable upstream error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    pub message: String,
    pub severity: ErrorSeverity,
}

impl UpstreamError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: ErrorSeverity::Recoverable,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: ErrorSeverity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == ErrorSeverity::Fatal
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Event emitted by an upstream client.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Transport is open (first connect or after a reconnect).
    Open,
    /// Transport dropped; the client reconnects on its own.
    Closed,
    /// Error notification.
    Error(UpstreamError),
    /// One order notification.
    Order(Box<OrderEvent>),
}

impl UpstreamEvent {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Error(_) => "error",
            Self::Order(_) => "order",
        }
    }
}
