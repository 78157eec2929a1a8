//! Authenticator implementation
//!
//! Applies Google bearer tokens to requests and refreshes them before expiry.

use super::types::{CachedToken, Credentials};
use crate::error::{Error, Result};
use crate::http::google_error_message;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Lifetime requested for service account assertions (Google's maximum)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Timeout for token endpoint and metadata server requests
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticator handles applying authentication to HTTP requests
pub struct Authenticator {
    /// Credential source
    credentials: Credentials,
    /// Cached access token
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests
    http_client: Client,
}

impl Authenticator {
    /// Create a new authenticator with the given credentials
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_timeout(credentials, DEFAULT_TOKEN_TIMEOUT)
    }

    /// Create an authenticator whose token requests give up after `timeout`
    pub fn with_timeout(credentials: Credentials, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        })
    }

    /// Apply authentication to a request builder
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.credentials {
            Credentials::None => Ok(req),
            Credentials::AccessToken { token } => Ok(req.bearer_auth(token)),
            Credentials::ServiceAccount { .. } | Credentials::MetadataServer { .. } => {
                let token = self.get_or_refresh_token().await?;
                Ok(req.bearer_auth(token))
            }
        }
    }

    /// Get a valid token, refreshing if necessary
    async fn get_or_refresh_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let new_token = self.fetch_new_token().await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);

        Ok(token_str)
    }

    /// Fetch a new token based on the credential source
    async fn fetch_new_token(&self) -> Result<CachedToken> {
        match &self.credentials {
            Credentials::ServiceAccount {
                client_email,
                private_key,
                private_key_id,
                token_uri,
                scopes,
            } => {
                let assertion = sign_assertion(
                    client_email,
                    private_key,
                    private_key_id.as_deref(),
                    token_uri,
                    scopes,
                )?;
                self.exchange_assertion(token_uri, &assertion).await
            }

            Credentials::MetadataServer { base_url } => self.fetch_metadata_token(base_url).await,

            _ => Err(Error::auth(
                "Token refresh not supported for this credential type",
            )),
        }
    }

    /// Exchange a signed JWT for an access token
    async fn exchange_assertion(&self, token_uri: &str, assertion: &str) -> Result<CachedToken> {
        let form = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion),
        ];

        let response = self
            .http_client
            .post(token_uri)
            .form(&form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::JwtGeneration {
                message: format!(
                    "Token exchange failed with status {status}: {}",
                    google_error_message(&body)
                ),
            });
        }

        let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
        debug!("Obtained access token from {}", token_uri);
        Ok(token_response.into_cached_token())
    }

    /// Ask the metadata server for the default service account's token
    async fn fetch_metadata_token(&self, base_url: &str) -> Result<CachedToken> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            base_url.trim_end_matches('/')
        );

        let response = self
            .http_client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Metadata server token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
        debug!("Obtained access token from metadata server");
        Ok(token_response.into_cached_token())
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("credentials", &self.credentials.kind())
            .finish_non_exhaustive()
    }
}

/// Sign a service account assertion
fn sign_assertion(
    client_email: &str,
    private_key: &str,
    private_key_id: Option<&str>,
    token_uri: &str,
    scopes: &[String],
) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: client_email.to_string(),
        scope: scopes.join(" "),
        aud: token_uri.to_string(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = private_key_id.map(String::from);

    let encoding_key =
        EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| Error::JwtGeneration {
            message: format!("Invalid private key: {e}"),
        })?;

    encode(&header, &claims, &encoding_key).map_err(|e| Error::JwtGeneration {
        message: format!("Failed to encode JWT: {e}"),
    })
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_cached_token(self) -> CachedToken {
        match self.expires_in {
            Some(secs) => CachedToken::expires_in(self.access_token, secs),
            None => CachedToken::new(self.access_token, None),
        }
    }
}

/// Service account assertion claims
#[derive(Debug, Serialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}
