//! Cloud Storage JSON API client

use super::{ObjectLocation, ObjectStore, StorageError};
use crate::auth::TokenProvider;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cloud Storage client configuration
#[derive(Debug, Clone)]
pub struct GcsConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://storage.googleapis.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Object store backed by the Cloud Storage JSON API
pub struct GcsObjectStore {
    config: GcsConfig,
    client: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl GcsObjectStore {
    pub fn new(config: GcsConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Object names are a single path segment in the JSON API, so `/` is encoded too
    fn download_url(&self, location: &ObjectLocation) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base(),
            location.bucket,
            utf8_percent_encode(&location.name, NON_ALPHANUMERIC)
        )
    }

    fn upload_url(&self, location: &ObjectLocation) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.base(), location.bucket)
    }

    async fn bearer(&self) -> Result<String, StorageError> {
        self.tokens
            .access_token()
            .await
            .map_err(|e| StorageError::AuthenticationFailed(e.to_string()))
    }

    async fn error_for_status(
        response: reqwest::Response,
        location: &ObjectLocation,
    ) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => StorageError::NotFound(location.to_uri()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                StorageError::AuthenticationFailed(format!("{status} - {body}"))
            }
            _ => StorageError::ApiError(format!("{status} - {body}")),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn read_text(&self, location: &ObjectLocation) -> Result<String, StorageError> {
        let token = self.bearer().await?;
        let response = self
            .client
            .get(self.download_url(location))
            .query(&[("alt", "media")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!("Cloud Storage download failed: {}", e);
                StorageError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, location).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;
        debug!(object = %location, bytes = text.len(), "Downloaded object");
        Ok(text)
    }

    async fn write_text(
        &self,
        location: &ObjectLocation,
        content: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let token = self.bearer().await?;
        let response = self
            .client
            .post(self.upload_url(location))
            .query(&[("uploadType", "media"), ("name", location.name.as_str())])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| {
                warn!("Cloud Storage upload failed: {}", e);
                StorageError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, location).await);
        }

        debug!(object = %location, bytes = content.len(), "Uploaded object");
        Ok(())
    }
}
