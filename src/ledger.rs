//! Product hold ledger
//!
//! A single text object with one `Product #<id> status: Hold` line per hold.
//!
//! Appends are read-modify-write over the whole object with no generation
//! precondition. Two runs appending at the same time can both read the old
//! content, and the later write drops the earlier record.

use crate::storage::{ObjectLocation, ObjectStore, StorageError};
use std::sync::Arc;
use tracing::info;

pub const LEDGER_CONTENT_TYPE: &str = "text/plain";

/// Format one ledger line
pub fn hold_record(product: &str) -> String {
    format!("Product #{product} status: Hold")
}

pub struct HoldLedger {
    store: Arc<dyn ObjectStore>,
    location: ObjectLocation,
}

impl HoldLedger {
    pub fn new(store: Arc<dyn ObjectStore>, location: ObjectLocation) -> Self {
        Self { store, location }
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    /// Append a hold record and return the line written
    pub async fn append(&self, product: &str) -> Result<String, StorageError> {
        let record = hold_record(product);
        let existing = self.store.read_text(&self.location).await?;
        let updated = format!("{existing}\n{record}");

        self.store
            .write_text(&self.location, &updated, LEDGER_CONTENT_TYPE)
            .await?;

        info!(ledger = %self.location, product = %product, "Recorded product hold");
        Ok(record)
    }

    /// All non-blank ledger lines, oldest first
    pub async fn records(&self) -> Result<Vec<String>, StorageError> {
        let content = self.store.read_text(&self.location).await?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
