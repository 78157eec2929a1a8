//! Credential types
//!
//! Google access tokens can come from a fixed token, a service account key file,
//! or the instance metadata server. `Credentials::from_env` picks one the way
//! the Google client libraries do.

use crate::error::{Error, Result};
use crate::types::OptionStringExt;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// OAuth scope needed for load jobs and streaming inserts
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Default token endpoint for service account assertions
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default metadata server address on GCE, Cloud Run and Cloud Functions
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Where access tokens come from
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    /// Send requests unauthenticated (emulators, tests)
    #[default]
    None,

    /// A pre-minted access token
    AccessToken {
        /// The bearer token
        token: String,
    },

    /// Service account key, exchanged for access tokens via a signed JWT
    ServiceAccount {
        /// Service account email (iss claim)
        client_email: String,
        /// PEM private key
        private_key: String,
        /// Key id, sent as the JWT `kid` header
        private_key_id: Option<String>,
        /// Token endpoint (aud claim and exchange URL)
        token_uri: String,
        /// Requested scopes
        scopes: Vec<String>,
    },

    /// Instance metadata server
    MetadataServer {
        /// Base URL, e.g. `http://metadata.google.internal`
        base_url: String,
    },
}

/// Service account key file as downloaded from the console
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Key type, must be `service_account`
    #[serde(rename = "type")]
    pub key_type: String,
    /// Service account email
    pub client_email: String,
    /// PEM private key
    pub private_key: String,
    /// Key id
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Token endpoint
    #[serde(default)]
    pub token_uri: Option<String>,
    /// Owning project
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Credentials {
    /// Build service account credentials from key file contents
    pub fn from_service_account_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json)?;
        if key.key_type != "service_account" {
            return Err(Error::auth(format!(
                "Unsupported credential type '{}', expected 'service_account'",
                key.key_type
            )));
        }

        Ok(Self::ServiceAccount {
            client_email: key.client_email,
            private_key: key.private_key,
            private_key_id: key.private_key_id,
            token_uri: key
                .token_uri
                .none_if_empty()
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            scopes: vec![BIGQUERY_SCOPE.to_string()],
        })
    }

    /// Build service account credentials from a key file on disk
    pub fn from_service_account_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_service_account_json(&content)
    }

    /// Resolve credentials from the environment
    ///
    /// Order: `GOOGLE_OAUTH_ACCESS_TOKEN`, then `GOOGLE_APPLICATION_CREDENTIALS`,
    /// then the metadata server (`GCE_METADATA_HOST` overrides its address).
    pub fn from_env() -> Result<Self> {
        if let Some(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .ok()
            .none_if_empty()
        {
            return Ok(Self::AccessToken { token });
        }

        if let Some(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
            .ok()
            .none_if_empty()
        {
            return Self::from_service_account_file(path);
        }

        let host = std::env::var("GCE_METADATA_HOST")
            .ok()
            .none_if_empty()
            .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
        Ok(Self::MetadataServer {
            base_url: format!("http://{host}"),
        })
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::None => "none",
            Credentials::AccessToken { .. } => "access_token",
            Credentials::ServiceAccount { .. } => "service_account",
            Credentials::MetadataServer { .. } => "metadata_server",
        }
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false,
        }
    }
}
