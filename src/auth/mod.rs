//! Authentication module
//!
//! Supports: static access token, service account key (JWT bearer grant),
//! and the instance metadata server.
//!
//! The `Authenticator` caches access tokens and refreshes them shortly
//! before they expire.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{
    CachedToken, Credentials, ServiceAccountKey, BIGQUERY_SCOPE, DEFAULT_METADATA_HOST,
    DEFAULT_TOKEN_URI,
};
