//! HTTP client for the Rentkar REST backend.
//!
//! Handles bearer authentication, timeout management, exponential backoff
//! retry, and mapping of HTTP failures onto `RkError`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use rk_core::config::AppConfig;
use rk_core::constants;
use rk_core::error::{RkError, RkResult};
use rk_core::kv::KeyValueStore;

use crate::response::ErrorBody;

/// Retry configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            retryable_statuses: vec![502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Where the bearer token for each request comes from.
#[derive(Clone)]
pub enum AuthSource {
    /// No `Authorization` header.
    None,
    /// A fixed token.
    Static(String),
    /// Read `userToken` from the key-value store on every request, so a
    /// login or logout takes effect without rebuilding the client.
    Store(Arc<dyn KeyValueStore>),
}

impl std::fmt::Debug for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthSource::None => write!(f, "None"),
            AuthSource::Static(_) => write!(f, "Static(..)"),
            AuthSource::Store(_) => write!(f, "Store(..)"),
        }
    }
}

/// HTTP client for communicating with the Rentkar backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL for the API (e.g. "https://example.com/api").
    api_root: String,
    /// Default request timeout.
    timeout: Duration,
    auth: AuthSource,
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new client for the given API root.
    pub fn new(api_root: &str, timeout: Duration) -> RkResult<Self> {
        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| RkError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            api_root: api_root.trim_end_matches('/').to_string(),
            timeout,
            auth: AuthSource::None,
            retry_config: RetryConfig::default(),
        })
    }

    /// Create a client from the application config, resolving the API root
    /// for the configured environment and device.
    pub fn from_config(config: &AppConfig) -> RkResult<Self> {
        let root = config.server.effective_api_base_url(config.device.os);
        Self::new(&root, Duration::from_millis(config.server.api_timeout_ms))
    }

    /// Set custom retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Set where the bearer token is read from.
    pub fn with_auth(mut self, auth: AuthSource) -> Self {
        self.auth = auth;
        self
    }

    /// Get the current API root URL.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// The bearer token the next request would carry, if any.
    pub fn auth_token(&self) -> RkResult<Option<String>> {
        let token = match &self.auth {
            AuthSource::None => None,
            AuthSource::Static(token) => Some(token.clone()),
            AuthSource::Store(store) => store.get(constants::AUTH_TOKEN_KEY)?,
        };
        Ok(token.filter(|t| !t.is_empty()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_root)
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> RequestBuilder {
        let mut builder = self.inner.request(method, url).timeout(self.timeout);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(b) = body {
            builder = builder.json(b);
        }
        builder
    }

    /// Execute a request with exponential backoff retry.
    async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> RkResult<Response> {
        let url = self.url(path);
        let token = self.auth_token()?;
        debug!("{} {}", method, path);

        let mut last_error: Option<RkError> = None;

        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                let delay = self.calculate_retry_delay(attempt - 1);
                warn!(
                    "retrying {} {} (attempt {}/{}) after {:.1}s",
                    method,
                    path,
                    attempt + 1,
                    self.retry_config.max_retries + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = self.build_request(method.clone(), &url, token.as_deref(), body);

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if self
                        .retry_config
                        .retryable_statuses
                        .contains(&status.as_u16())
                        && attempt < self.retry_config.max_retries
                    {
                        warn!("retryable status {} from {}", status.as_u16(), path);
                        last_error = Some(RkError::ServerError {
                            status: status.as_u16(),
                            message: format!("retryable status {status}"),
                        });
                        continue;
                    }

                    return Self::check_status(response).await;
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let err = Self::classify_error(e);

                    if is_retryable && attempt < self.retry_config.max_retries {
                        warn!("retryable error on {}: {}", path, err);
                        last_error = Some(err);
                        continue;
                    }

                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RkError::Http("max retries exceeded".into())))
    }

    /// Calculate retry delay with exponential backoff.
    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_config.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << attempt.min(32));
        let max_ms = self.retry_config.max_delay.as_millis() as u64;
        Duration::from_millis(delay_ms.min(max_ms))
    }

    /// Execute a GET request with automatic retry.
    pub async fn get(&self, path: &str) -> RkResult<Response> {
        self.request_with_retry(Method::GET, path, None).await
    }

    /// Execute a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> RkResult<Response> {
        self.request_with_retry(Method::POST, path, Some(body)).await
    }

    /// Deserialize a JSON response body.
    pub async fn parse_json<T: DeserializeOwned>(response: Response) -> RkResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| RkError::Serialization(format!("failed to parse response: {e}")))
    }

    /// Convenience: GET + parse.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RkResult<T> {
        let resp = self.get(path).await?;
        Self::parse_json(resp).await
    }

    /// Check the HTTP status code and convert to RkError if needed.
    async fn check_status(response: Response) -> RkResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            let message = ErrorBody::message_from(&body).unwrap_or_else(|| status.to_string());
            return Err(RkError::AuthFailed(message));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RkError::ServerError {
                status: status.as_u16(),
                message: ErrorBody::message_from(&body).unwrap_or(body),
            });
        }

        Ok(response)
    }

    /// Classify a reqwest error into an RkError variant.
    fn classify_error(e: reqwest::Error) -> RkError {
        if e.is_timeout() {
            RkError::Timeout(e.to_string())
        } else if e.is_connect() {
            RkError::Http(format!("connection failed: {e}"))
        } else {
            RkError::Http(e.to_string())
        }
    }
}
