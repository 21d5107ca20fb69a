//! HTTP client for the notification backend's REST API.
//!
//! Handles token authentication, custom headers, timeout management, SSL
//! certificate handling, exponential backoff retry, and request/response lifecycle.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use bc_core::config::{AppConfig, ServerConfig};
use bc_core::constants;
use bc_core::error::{BcError, BcResult};

use crate::response::ApiErrorBody;

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

/// HTTP client for communicating with the notification backend.
///
/// Wraps reqwest::Client with token authentication, header injection,
/// retry logic, and error handling. Clones share the credential.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL for the API, the server address plus `/api`. A path prefix
    /// on the address is kept, matching the channel endpoint.
    api_root: String,
    /// Credential sent as `Authorization: Token <credential>`.
    token: Arc<RwLock<Option<String>>>,
    /// Default request timeout.
    timeout: Duration,
    /// Custom headers from server config.
    custom_headers: Vec<(String, String)>,
    /// Retry configuration.
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new ApiClient from server configuration.
    pub fn new(config: &ServerConfig) -> BcResult<Self> {
        if config.address.trim().is_empty() {
            return Err(BcError::MissingConfig("server.address".into()));
        }
        let sanitized_address = AppConfig::sanitize_server_address(&config.address);

        let mut builder = Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms))
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(bc_core::Platform::user_agent());

        // Handle self-signed certificates
        if config.accept_self_signed_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let inner = builder
            .build()
            .map_err(|e| BcError::Http(format!("failed to build HTTP client: {e}")))?;

        let api_root = format!("{sanitized_address}{}", constants::API_PREFIX);

        let mut custom_headers: Vec<(String, String)> = config
            .custom_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        custom_headers.sort();

        Ok(Self {
            inner,
            api_root,
            token: Arc::new(RwLock::new(None)),
            timeout: Duration::from_millis(config.api_timeout_ms),
            custom_headers,
            retry_config: RetryConfig::default(),
        })
    }

    /// Create a client from the full app config, carrying its stored token.
    pub fn from_config(config: &AppConfig) -> BcResult<Self> {
        let client = Self::new(&config.server)?;
        let token = config.auth.token.trim();
        let token = (!token.is_empty()).then(|| token.to_string());
        Ok(Self {
            token: Arc::new(RwLock::new(token)),
            ..client
        })
    }

    /// Set custom retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Get the current API root URL.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Replace the credential used for authenticated requests.
    pub async fn set_token(&self, token: Option<String>) {
        let mut guard = self.token.write().await;
        *guard = token.filter(|t| !t.trim().is_empty());
        if guard.is_some() {
            debug!("api credential set");
        } else {
            debug!("api credential cleared");
        }
    }

    /// The current credential, if any.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Build the full URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_root)
    }

    /// Apply custom headers and the authorization header to a request builder.
    fn apply_headers(&self, mut builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        for (key, value) in &self.custom_headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("Token {token}"));
        }
        builder
    }

    /// Internal: build a request for the given method, URL, and optional JSON body.
    fn build_request(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> RequestBuilder {
        let mut builder = self.inner.request(method, url).timeout(self.timeout);
        if let Some(b) = body {
            builder = builder.json(b);
        }
        self.apply_headers(builder, token)
    }

    /// Execute a request with exponential backoff retry.
    async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        authenticated: bool,
    ) -> BcResult<Response> {
        let token = if authenticated {
            let token = self.token().await;
            if token.is_none() {
                return Err(BcError::AuthFailed("not logged in".into()));
            }
            token
        } else {
            None
        };

        let url = self.url(path);
        debug!("{} {}", method, path);

        let mut last_error: Option<BcError> = None;

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

                    // Check if this status code is retryable
                    if self
                        .retry_config
                        .retryable_statuses
                        .contains(&status.as_u16())
                        && attempt < self.retry_config.max_retries
                    {
                        warn!("retryable status {} from {}", status.as_u16(), path);
                        last_error = Some(BcError::ServerError {
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

        Err(last_error.unwrap_or_else(|| BcError::Http("max retries exceeded".into())))
    }

    /// Calculate retry delay with exponential backoff.
    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_config.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let max_ms = self.retry_config.max_delay.as_millis() as u64;
        Duration::from_millis(delay_ms.min(max_ms))
    }

    // --- Public HTTP methods ---

    /// Execute an authenticated GET request with automatic retry.
    pub async fn get(&self, path: &str) -> BcResult<Response> {
        self.request_with_retry(Method::GET, path, None, true).await
    }

    /// Execute an authenticated POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> BcResult<Response> {
        self.request_with_retry(Method::POST, path, Some(body), true)
            .await
    }

    /// Execute a POST request without the authorization header.
    pub async fn post_anonymous(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> BcResult<Response> {
        self.request_with_retry(Method::POST, path, Some(body), false)
            .await
    }

    // --- Response helpers ---

    /// Deserialize a response body.
    pub async fn parse_response<T: DeserializeOwned>(response: Response) -> BcResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| BcError::Serialization(format!("failed to parse response: {e}")))
    }

    /// Convenience: GET + parse.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BcResult<T> {
        let resp = self.get(path).await?;
        Self::parse_response(resp).await
    }

    /// Check the HTTP status code and convert to BcError if needed.
    async fn check_status(response: Response) -> BcResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            let detail = ApiErrorBody::message_from(&body)
                .unwrap_or_else(|| format!("server returned {status}"));
            return Err(BcError::AuthFailed(detail));
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            let message = ApiErrorBody::message_from(&body).unwrap_or(body);
            return Err(BcError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Classify a reqwest error into a BcError variant.
    fn classify_error(e: reqwest::Error) -> BcError {
        if e.is_timeout() {
            BcError::Timeout(e.to_string())
        } else if e.is_connect() {
            BcError::Http(format!("connection failed: {e}"))
        } else {
            BcError::Http(e.to_string())
        }
    }
}
