//! Credential providers for Google Cloud APIs
//!
//! Two kinds of bearer tokens are needed: OAuth access tokens for Vertex AI
//! and Cloud Storage, and audience-scoped identity tokens for calling the
//! agent service from the relay.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default compute metadata server endpoint
pub const DEFAULT_METADATA_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default";

/// Cached access tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Credential errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No credentials available: {0}")]
    NoCredentials(String),
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
}

/// Source of bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// OAuth access token for Google APIs
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Identity token whose audience is the given URL
    async fn identity_token(&self, audience: &str) -> Result<String, AuthError>;
}

/// Token provider backed by the compute metadata server
///
/// Access tokens are cached until shortly before `expires_in`. Identity
/// tokens are fetched per call.
pub struct MetadataTokenProvider {
    base_url: String,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl MetadataTokenProvider {
    pub fn new() -> Result<Self, AuthError> {
        Self::with_base_url(DEFAULT_METADATA_URL)
    }

    /// Point the provider at a different metadata endpoint (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::NoCredentials(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            cached: Mutex::new(None),
        })
    }

    async fn fetch(&self, url: &str, query: &[(&str, &str)]) -> Result<String, AuthError> {
        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .query(query)
            .send()
            .await
            .map_err(|e| {
                // Connection failures mean we are not running on GCP
                warn!("Metadata server unreachable: {}", e);
                AuthError::NoCredentials(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "metadata server returned {status}: {body}"
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.refresh_at {
                return Ok(entry.token.clone());
            }
        }

        let url = format!("{}/token", self.base_url);
        let body = self.fetch(&url, &[]).await?;
        let parsed: AccessTokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::RefreshFailed(format!("invalid token response: {e}")))?;
        debug!(expires_in = parsed.expires_in, "Fetched access token from metadata server");

        let lifetime = Duration::from_secs(parsed.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            token: parsed.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(parsed.access_token)
    }

    async fn identity_token(&self, audience: &str) -> Result<String, AuthError> {
        let url = format!("{}/identity", self.base_url);
        let token = self
            .fetch(&url, &[("audience", audience), ("format", "full")])
            .await?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(AuthError::RefreshFailed(
                "metadata server returned an empty identity token".to_string(),
            ));
        }
        debug!(audience = %audience, "Fetched identity token from metadata server");
        Ok(token)
    }
}

/// Fixed token for local development, read from an environment variable
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn from_env(var: &str) -> Result<Self, AuthError> {
        std::env::var(var)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| AuthError::NoCredentials(format!("{var} is not set")))
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }

    async fn identity_token(&self, _audience: &str) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}
