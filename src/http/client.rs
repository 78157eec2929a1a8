//! HTTP client with retry and rate limiting
//!
//! Provides the transport used by the BigQuery client:
//! - Per-request retry counts with configurable backoff
//! - Optional rate limiting to stay under API quotas
//! - Bearer token injection from the auth module
//! - Google error bodies reduced to their `error.message`

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::types::BackoffType;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone, PartialEq)]
pub struct HttpClientConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries after the first attempt, unless a request overrides it
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            rate_limit: Some(RateLimiterConfig::default()),
            user_agent: format!("bq-ingest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Options for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Request body (JSON)
    pub body: Option<Value>,
    /// Override max retries for this request
    pub max_retries: Option<u32>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send exactly once; for writes that must not be repeated
    #[must_use]
    pub fn no_retry(mut self) -> Self {
        self.max_retries = Some(0);
        self
    }
}

/// HTTP client with retry and rate limiting
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Option<Arc<Authenticator>>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create an unauthenticated client (emulators, tests)
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(Error::Http)?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            authenticator: None,
            rate_limiter,
        })
    }

    /// Create a client that signs every request with the given authenticator
    pub fn with_auth(config: HttpClientConfig, authenticator: Arc<Authenticator>) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.authenticator = Some(authenticator);
        Ok(client)
    }

    /// GET `url` and parse the JSON response
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<T> {
        self.request_json(Method::GET, url, config).await
    }

    /// POST to `url` and parse the JSON response
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<T> {
        self.request_json(Method::POST, url, config).await
    }

    /// Make a request and parse JSON response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<T> {
        let response = self.request(method, url, config).await?;
        response.json().await.map_err(Error::Http)
    }

    /// Send a request, retrying throttling, 5xx, timeouts and connect failures
    ///
    /// Any other error status is returned as [`Error::HttpStatus`] with the
    /// Google error message as body.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<Response> {
        let max_retries = config.max_retries.unwrap_or(self.config.max_retries);
        let mut attempt = 0;

        loop {
            if let Some(limiter) = &self.rate_limiter {
                limiter.wait().await;
            }

            let req = self.prepare(method.clone(), url, &config).await?;
            let error = match req.send().await {
                Ok(response) if !is_error_status(response.status()) => {
                    debug!("Request succeeded: {} {}", method, url);
                    return Ok(response);
                }
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = extract_retry_after(&response);
                    if attempt >= max_retries {
                        return Err(Error::RateLimited {
                            retry_after_seconds: retry_after,
                        });
                    }
                    warn!(
                        "Rate limited (429), attempt {}/{}, waiting {}s",
                        attempt + 1,
                        max_retries + 1,
                        retry_after
                    );
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                    attempt += 1;
                    continue;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let error = Error::HttpStatus {
                        status: status.as_u16(),
                        body: google_error_message(&body),
                    };
                    if !is_retryable_status(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_timeout() => Error::Timeout {
                    timeout_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
                },
                Err(e) if e.is_connect() => Error::Http(e),
                Err(e) => return Err(Error::Http(e)),
            };

            if attempt >= max_retries {
                return Err(error);
            }

            let delay = self.calculate_backoff(attempt);
            warn!(
                "{}, attempt {}/{}, retrying in {:?}",
                error,
                attempt + 1,
                max_retries + 1,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn prepare(
        &self,
        method: Method,
        url: &str,
        config: &RequestConfig,
    ) -> Result<RequestBuilder> {
        let mut req = self.client.request(method, url);
        if !config.query.is_empty() {
            req = req.query(&config.query);
        }
        if let Some(body) = &config.body {
            req = req.json(body);
        }
        match &self.authenticator {
            Some(auth) => auth.apply(req).await,
            None => Ok(req),
        }
    }

    /// Backoff delay before retry number `attempt + 1`
    pub(crate) fn calculate_backoff(&self, attempt: u32) -> Duration {
        self.config.backoff_type.delay(
            attempt,
            self.config.initial_backoff,
            self.config.max_backoff,
        )
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

fn is_error_status(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

/// Server-side failures worth another attempt
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

/// Seconds from the `Retry-After` header, 60 when absent
fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}

/// Pull `error.message` out of a Google API error body, falling back to the raw text
pub(crate) fn google_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
