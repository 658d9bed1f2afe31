//! Filesystem-backed object store for local runs
//!
//! `gs://<bucket>/<name>` maps to `<root>/<bucket>/<name>`.

use super::{ObjectLocation, ObjectStore, StorageError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a location to a path under the root (pure function)
    ///
    /// A leading `/` in the object name is dropped so the path stays under the bucket
    /// directory.
    fn resolve(&self, location: &ObjectLocation) -> Result<PathBuf, StorageError> {
        let relative = Path::new(&location.bucket).join(location.name.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StorageError::InvalidLocation(format!(
                "{location} escapes the storage root"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn read_text(&self, location: &ObjectLocation) -> Result<String, StorageError> {
        let path = self.resolve(location)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(location.to_uri())
            } else {
                StorageError::Io(format!("{}: {e}", path.display()))
            }
        })
    }

    async fn write_text(
        &self,
        location: &ObjectLocation,
        content: &str,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))
    }
}
