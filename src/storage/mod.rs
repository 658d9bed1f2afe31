//! Object storage access
//!
//! Documents and the hold ledger live in a Cloud Storage bucket. The
//! [`ObjectStore`] trait is the seam: the pipeline only needs to read and
//! overwrite whole objects as text.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod gcs;
pub mod local;

pub use gcs::{GcsConfig, GcsObjectStore};
pub use local::LocalObjectStore;

/// URI scheme for Cloud Storage locations
pub const GCS_SCHEME: &str = "gs://";

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Invalid object location: {0}")]
    InvalidLocation(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Storage authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Storage network error: {0}")]
    NetworkError(String),
    #[error("Storage API error: {0}")]
    ApiError(String),
    #[error("Storage I/O error: {0}")]
    Io(String),
}

/// A `gs://<bucket>/<name>` object reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub name: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// Parse a `gs://bucket/object/name` URI
    pub fn parse(uri: &str) -> Result<Self, StorageError> {
        let rest = uri
            .strip_prefix(GCS_SCHEME)
            .ok_or_else(|| StorageError::InvalidLocation(format!("'{uri}' is not a gs:// URI")))?;

        let (bucket, name) = rest.split_once('/').ok_or_else(|| {
            StorageError::InvalidLocation(format!("'{uri}' has no object name"))
        })?;

        if bucket.is_empty() || name.is_empty() {
            return Err(StorageError::InvalidLocation(format!(
                "'{uri}' must name both a bucket and an object"
            )));
        }

        Ok(Self::new(bucket, name))
    }

    /// Render back to `gs://bucket/name`
    pub fn to_uri(&self) -> String {
        format!("{GCS_SCHEME}{}/{}", self.bucket, self.name)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

/// Normalize a bucket setting (`my-bucket` or `gs://my-bucket/`) to `gs://my-bucket`
pub fn normalize_base_location(setting: &str) -> String {
    let trimmed = setting.trim().trim_end_matches('/');
    if trimmed.starts_with(GCS_SCHEME) {
        trimmed.to_string()
    } else {
        format!("{GCS_SCHEME}{trimmed}")
    }
}

/// Bucket name of a normalized base location (any path prefix is dropped)
pub fn bucket_of(base_location: &str) -> &str {
    let rest = base_location
        .strip_prefix(GCS_SCHEME)
        .unwrap_or(base_location);
    rest.split('/').next().unwrap_or(rest)
}

/// Whole-object text storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object as UTF-8 text
    async fn read_text(&self, location: &ObjectLocation) -> Result<String, StorageError>;

    /// Create or overwrite an object
    async fn write_text(
        &self,
        location: &ObjectLocation,
        content: &str,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
