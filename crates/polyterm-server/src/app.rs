//! Application wiring and lifecycle.

use crate::config::{AppConfig, DISPATCH_TOKEN_ENV, UPSTREAM_API_KEY_ENV};
use crate::error::AppResult;
use polyterm_gateway::{run_server, AppState, CollaboratorProxy};
use polyterm_ws::{DynFeedConnector, WsFeedConnector};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the shared handler state.
    ///
    /// A missing upstream API key is not fatal at startup: stream requests
    /// are rejected with a configuration error instead.
    pub fn build_state(&self) -> AppResult<AppState> {
        let connector: Option<DynFeedConnector> = match self.config.upstream.client_config() {
            Some(upstream) => {
                info!(
                    url = %upstream.url,
                    platform = %upstream.platform,
                    max_reconnect_attempts = upstream.max_reconnect_attempts,
                    "Upstream feed configured"
                );
                Some(Arc::new(WsFeedConnector::new(upstream)))
            }
            None => {
                warn!(env = UPSTREAM_API_KEY_ENV, "Upstream API key not set, streams disabled");
                None
            }
        };

        if self.config.dispatch.token.is_none() {
            warn!(env = DISPATCH_TOKEN_ENV, "Dispatch token not set, proxy routes disabled");
        }
        let proxy = CollaboratorProxy::new(self.config.dispatch.clone())?;

        Ok(AppState::new(self.config.server.clone(), connector, proxy))
    }

    /// Serve until Ctrl-C, then close every live session.
    pub async fn run(self) -> AppResult<()> {
        let state = self.build_state()?;
        run_server(state, shutdown_signal()).await?;
        info!("Shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
