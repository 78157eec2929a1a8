//! HTTP client module
//!
//! Transport for BigQuery REST calls. Token endpoints use the authenticator's
//! own client.
//!
//! # Features
//!
//! - **Per-request retries**: Configurable retry count with backoff; writes opt out
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Authentication**: Bearer tokens from the auth module

mod client;
mod rate_limit;

pub(crate) use client::google_error_message;
pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::RateLimiterConfig;
