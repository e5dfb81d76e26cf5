//! polyterm-gateway - Real-time wallet activity streams over SSE.
//!
//! A client opens `GET /api/stream?wallet=0x...` and receives a persistent
//! `text/event-stream` body. Each stream is backed by a `StreamSession` that
//! owns its own upstream subscription and heartbeat timer.
//!
//! # Architecture
//!
//! ```text
//! client ──GET /api/stream──▶ open_stream ──▶ StreamSession::start
//!                                                  │
//!          ┌───────────── mpsc<UpstreamEvent> ─────┤
//!          │                                       │
//!   OrderFeed (polyterm-ws)              drive task: connect, subscribe,
//!                                        translate, heartbeat
//!                                                  │
//! client ◀── SSE frames ◀── SessionStream ◀── mpsc<OutwardMessage>
//! ```
//!
//! Dropping the SSE body cancels the session; the drive task then closes
//! the upstream feed and evicts the session from `SessionRegistry`.
//!
//! The same server proxies order placement and claim requests to their
//! collaborators through `polyterm-dispatch`.

mod config;
mod error;
mod limiter;
mod proxy;
mod registry;
mod server;
mod session;
mod sse;
pub mod translator;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use limiter::{SessionLimiter, SessionPermit};
pub use proxy::{CollaboratorProxy, ProxyRoute};
pub use registry::SessionRegistry;
pub use server::{create_router, run_server, serve, AppState};
pub use session::{
    CloseReason, SessionId, SessionInfo, SessionOptions, SessionState, StreamSession,
};
pub use sse::{sse_response, SessionStream};
