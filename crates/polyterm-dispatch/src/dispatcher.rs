//! Retry-until-JSON dispatcher.
//!
//! Serverless collaborators answer their first calls after a cold start with
//! HTML error pages or empty bodies. The dispatcher re-issues the same POST a
//! bounded number of times, with a fixed delay, until the response declares a
//! JSON content type. It never synthesizes a failure: after the last attempt
//! the final response is handed back as-is and the caller classifies it.

use crate::error::{DispatchError, DispatchResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Content type a well-formed response must declare.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Default attempt budget per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Longest body excerpt kept in error messages.
const BODY_SNIPPET_LEN: usize = 200;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One outbound POST, including its retry budget.
#[derive(Debug, Clone)]
pub struct RetryableRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
    /// Attempts made so far.
    pub attempt: u32,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl RetryableRequest {
    /// Create a request with the default retry budget.
    pub fn new(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
            body,
            attempt: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the retry budget.
    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Attach a bearer token.
    pub fn bearer(mut self, token: &str) -> DispatchResult<Self> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| DispatchError::InvalidHeader(format!("authorization: {e}")))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }
}

/// Response captured from one attempt.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl DispatchResponse {
    /// Whether the response declares a JSON content type.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(JSON_CONTENT_TYPE))
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> DispatchResult<serde_json::Value> {
        if !self.is_json() {
            return Err(DispatchError::NotJson(self.body_snippet()));
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Leading part of the body, for logs and error messages.
    pub fn body_snippet(&self) -> String {
        self.body.chars().take(BODY_SNIPPET_LEN).collect()
    }
}

/// Final result of a dispatched request.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Response of the last attempt.
    pub response: DispatchResponse,
    /// Total attempts made.
    pub attempts: u32,
    /// Whether any retry happened.
    pub is_retry: bool,
    /// Sum of the delays slept between attempts.
    pub total_delay: Duration,
}

impl DispatchOutcome {
    pub fn is_json(&self) -> bool {
        self.response.is_json()
    }
}

/// Transport used to issue a single attempt.
///
/// Tests substitute a scripted implementation.
pub trait HttpTransport: Send + Sync {
    fn post<'a>(
        &'a self,
        request: &'a RetryableRequest,
    ) -> BoxFuture<'a, DispatchResult<DispatchResponse>>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> DispatchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post<'a>(
        &'a self,
        request: &'a RetryableRequest,
    ) -> BoxFuture<'a, DispatchResult<DispatchResponse>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&request.url)
                .headers(request.headers.clone())
                .json(&request.body)
                .send()
                .await
                .map_err(|e| DispatchError::Transport(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response
                .text()
                .await
                .map_err(|e| DispatchError::Transport(format!("Failed to read response: {e}")))?;

            Ok(DispatchResponse {
                status,
                content_type,
                body,
            })
        })
    }
}

/// Bounded retry-until-JSON dispatcher.
#[derive(Clone)]
pub struct RetryableDispatcher {
    transport: Arc<dyn HttpTransport>,
}

impl RetryableDispatcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Dispatcher over a reqwest client with the given per-attempt timeout.
    pub fn with_reqwest(timeout: Duration) -> DispatchResult<Self> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(timeout)?)))
    }

    /// Send `request`, retrying while the response is not JSON.
    ///
    /// Transport failures are returned immediately. A non-JSON response on
    /// the last attempt is returned as a successful outcome.
    pub async fn send(&self, mut request: RetryableRequest) -> DispatchResult<DispatchOutcome> {
        let max_attempts = request.max_attempts.max(1);
        let mut total_delay = Duration::ZERO;

        loop {
            request.attempt += 1;
            debug!(url = %request.url, attempt = request.attempt, max_attempts, "Dispatching request");

            let response = self.transport.post(&request).await?;
            let is_json = response.is_json();

            if is_json || request.attempt >= max_attempts {
                let is_retry = request.attempt > 1;
                if is_retry && is_json {
                    info!(
                        url = %request.url,
                        attempts = request.attempt,
                        "Request recovered after retry"
                    );
                } else if !is_json {
                    warn!(
                        url = %request.url,
                        attempts = request.attempt,
                        status = %response.status,
                        "Response still not JSON after final attempt"
                    );
                }

                return Ok(DispatchOutcome {
                    response,
                    attempts: request.attempt,
                    is_retry,
                    total_delay,
                });
            }

            warn!(
                url = %request.url,
                attempt = request.attempt,
                status = %response.status,
                content_type = response.content_type.as_deref().unwrap_or("none"),
                delay_ms = request.retry_delay.as_millis() as u64,
                "Non-JSON response, retrying"
            );

            tokio::time::sleep(request.retry_delay).await;
            total_delay += request.retry_delay;
        }
    }
}
