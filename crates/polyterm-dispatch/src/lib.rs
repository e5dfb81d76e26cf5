//! Outbound dispatch to serverless collaborators.
//!
//! The order placement and claim collaborators can answer with non-JSON
//! bodies while warming up. `RetryableDispatcher` retries those responses a
//! bounded number of times and reports how the request went.

pub mod config;
pub mod dispatcher;
pub mod error;

pub use config::{DispatchConfig, DEFAULT_CLAIM_PATH, DEFAULT_ORDER_PATH};
pub use dispatcher::{
    BoxFuture, DispatchOutcome, DispatchResponse, HttpTransport, ReqwestTransport,
    RetryableDispatcher, RetryableRequest, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
    JSON_CONTENT_TYPE,
};
pub use error::{DispatchError, DispatchResult};
