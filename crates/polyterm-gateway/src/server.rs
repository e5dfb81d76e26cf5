//! HTTP server implementation using axum.

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use polyterm_core::WalletAddress;
use polyterm_telemetry::Metrics;
use polyterm_ws::DynFeedConnector;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::limiter::SessionLimiter;
use crate::proxy::{CollaboratorProxy, ProxyRoute};
use crate::registry::SessionRegistry;
use crate::session::{SessionOptions, StreamSession};
use crate::sse::{sse_response, SessionStream};

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    registry: SessionRegistry,
    /// `None` when no upstream API key is configured.
    connector: Option<DynFeedConnector>,
    proxy: Arc<CollaboratorProxy>,
    limiter: Arc<SessionLimiter>,
    options: SessionOptions,
    config: GatewayConfig,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        connector: Option<DynFeedConnector>,
        proxy: CollaboratorProxy,
    ) -> Self {
        let options = SessionOptions {
            heartbeat_interval: config.heartbeat_interval(),
            channel_capacity: config.channel_capacity,
            ..Default::default()
        };
        Self {
            registry: SessionRegistry::new(),
            connector,
            proxy: Arc::new(proxy),
            limiter: Arc::new(SessionLimiter::new(config.max_sessions)),
            options,
            config,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/stream", get(open_stream))
        .route("/api/orders", post(place_order))
        .route("/api/claim", post(claim))
        .route("/api/sessions", get(list_sessions))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct StreamParams {
    wallet: Option<String>,
}

/// Open an SSE stream of order activity for one wallet.
async fn open_stream(
    State(state): State<AppState>,
    params: Result<Query<StreamParams>, QueryRejection>,
) -> GatewayResult<Response> {
    let Query(params) = params.map_err(|e| GatewayError::InvalidInput(e.body_text()))?;
    let raw = params
        .wallet
        .ok_or_else(|| GatewayError::InvalidInput("wallet query parameter is required".into()))?;
    let wallet = WalletAddress::parse(&raw)
        .map_err(|_| GatewayError::InvalidInput(format!("invalid wallet address: {raw}")))?;

    let connector = state
        .connector
        .clone()
        .ok_or_else(|| GatewayError::Configuration("Upstream API key not configured".into()))?;

    let permit = state
        .limiter
        .try_acquire()
        .ok_or(GatewayError::TooManySessions(state.limiter.max()))?;

    let (session, rx) = StreamSession::start(
        wallet,
        connector.as_ref(),
        state.registry.clone(),
        &state.options,
        Some(permit),
    );
    info!(
        session_id = %session.id(),
        wallet = %session.wallet(),
        streams = state.limiter.current_count(),
        "Stream opened"
    );

    Ok(sse_response(SessionStream::new(rx, session)))
}

async fn place_order(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> GatewayResult<Response> {
    state.proxy.forward(ProxyRoute::Orders, json_body(body)?).await
}

async fn claim(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> GatewayResult<Response> {
    state.proxy.forward(ProxyRoute::Claim, json_body(body)?).await
}

/// Unwrap a JSON body, reporting rejections in the `{error}` shape.
fn json_body(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> GatewayResult<serde_json::Value> {
    body.map(|Json(value)| value)
        .map_err(|e| GatewayError::InvalidInput(e.body_text()))
}

async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.registry.snapshot();
    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": state.registry.len(),
    }))
}

async fn metrics() -> GatewayResult<Response> {
    let body = Metrics::render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// Every live session is closed as part of shutdown, which ends the open
/// SSE bodies so the graceful drain can finish.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> GatewayResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = state.registry.clone();
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!(sessions = registry.len(), "Shutdown requested, closing sessions");
            registry.close_all().await;
        })
        .await?;

    info!("Gateway server stopped");
    Ok(())
}

/// Bind the configured address and run the gateway server.
pub async fn run_server<F>(state: AppState, shutdown: F) -> GatewayResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Starting gateway server");
    serve(listener, state, shutdown).await
}
