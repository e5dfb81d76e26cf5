//! Order placement and claim proxy.
//!
//! Forwards a JSON body to a collaborator through `RetryableDispatcher` and
//! relays the collaborator's JSON answer with its status code.

use crate::error::{GatewayError, GatewayResult};
use axum::response::{IntoResponse, Json, Response};
use polyterm_dispatch::{DispatchConfig, RetryableDispatcher};
use polyterm_telemetry::Metrics;
use tracing::{info, warn};

/// Collaborator behind a proxy route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyRoute {
    Orders,
    Claim,
}

impl ProxyRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Claim => "claim",
        }
    }

    fn url(&self, config: &DispatchConfig) -> String {
        match self {
            Self::Orders => config.order_url(),
            Self::Claim => config.claim_url(),
        }
    }
}

pub struct CollaboratorProxy {
    dispatcher: RetryableDispatcher,
    config: DispatchConfig,
}

impl CollaboratorProxy {
    /// Proxy over a reqwest-backed dispatcher.
    pub fn new(config: DispatchConfig) -> GatewayResult<Self> {
        let dispatcher = RetryableDispatcher::with_reqwest(config.timeout())?;
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    pub fn with_dispatcher(config: DispatchConfig, dispatcher: RetryableDispatcher) -> Self {
        Self { dispatcher, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Forward `body` to the collaborator behind `route`.
    pub async fn forward(
        &self,
        route: ProxyRoute,
        body: serde_json::Value,
    ) -> GatewayResult<Response> {
        let token = self
            .config
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GatewayError::Configuration("Dispatch token not configured".into()))?;

        let request = self
            .config
            .request(route.url(&self.config), body)
            .bearer(token)
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        let outcome = match self.dispatcher.send(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                Metrics::dispatch_failed(route.as_str(), "transport");
                return Err(e.into());
            }
        };
        Metrics::dispatch(route.as_str(), outcome.attempts, outcome.is_retry);

        if !outcome.is_json() {
            Metrics::dispatch_failed(route.as_str(), "non_json");
            warn!(
                route = route.as_str(),
                attempts = outcome.attempts,
                status = %outcome.response.status,
                body = %outcome.response.body_snippet(),
                "Collaborator never returned JSON"
            );
            return Err(GatewayError::NonJsonResponse {
                attempts: outcome.attempts,
            });
        }

        let body = outcome.response.json()?;
        info!(
            route = route.as_str(),
            status = %outcome.response.status,
            attempts = outcome.attempts,
            is_retry = outcome.is_retry,
            total_delay_ms = outcome.total_delay.as_millis() as u64,
            "Collaborator request completed"
        );
        Ok((outcome.response.status, Json(body)).into_response())
    }
}
