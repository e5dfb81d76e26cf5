//! polyterm - wallet activity streaming gateway.
//!
//! Wires configuration, the upstream feed connector, and the collaborator
//! proxy into the gateway HTTP server.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
