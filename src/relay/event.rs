//! Storage upload notification payloads

use crate::storage::ObjectLocation;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Event payload is missing expected key: {0}")]
    MissingKey(&'static str),
    #[error("Event payload is not a JSON object")]
    NotAnObject,
}

/// The two fields the relay needs from a storage object event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObjectEvent {
    pub bucket: String,
    pub name: String,
}

impl StorageObjectEvent {
    /// Read `bucket` and `name` from an event payload.
    ///
    /// Accepts the bare object metadata (CloudEvents binary mode) or a
    /// structured-mode envelope carrying it under `data`.
    pub fn from_payload(payload: &Value) -> Result<Self, EventError> {
        let data = unwrap_structured(payload);
        let object = data.as_object().ok_or(EventError::NotAnObject)?;

        let field = |key: &'static str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(EventError::MissingKey(key))
        };

        Ok(Self {
            bucket: field("bucket")?,
            name: field("name")?,
        })
    }

    pub fn location(&self) -> ObjectLocation {
        ObjectLocation::new(self.bucket.clone(), self.name.clone())
    }

    /// `gs://<bucket>/<name>`
    pub fn document_uri(&self) -> String {
        self.location().to_uri()
    }
}

fn unwrap_structured(payload: &Value) -> &Value {
    match (payload.get("specversion"), payload.get("data")) {
        (Some(_), Some(data)) => data,
        _ => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binary_mode_payload() {
        let event = StorageObjectEvent::from_payload(&json!({
            "bucket": "coa-docs",
            "name": "incoming/lot 7.pdf",
            "contentType": "application/pdf"
        }))
        .unwrap();

        assert_eq!(event.bucket, "coa-docs");
        assert_eq!(event.name, "incoming/lot 7.pdf");
        assert_eq!(event.document_uri(), "gs://coa-docs/incoming/lot 7.pdf");
    }

    #[test]
    fn test_structured_mode_payload() {
        let event = StorageObjectEvent::from_payload(&json!({
            "specversion": "1.0",
            "type": "google.cloud.storage.object.v1.finalized",
            "source": "//storage.googleapis.com/projects/_/buckets/b",
            "id": "1",
            "data": {"bucket": "b", "name": "f.pdf"}
        }))
        .unwrap();

        assert_eq!(event.document_uri(), "gs://b/f.pdf");
    }

    #[test]
    fn test_missing_or_non_string_fields() {
        assert_eq!(
            StorageObjectEvent::from_payload(&json!({"bucket": "b"})),
            Err(EventError::MissingKey("name"))
        );
        assert_eq!(
            StorageObjectEvent::from_payload(&json!({"name": "f.pdf"})),
            Err(EventError::MissingKey("bucket"))
        );
        assert_eq!(
            StorageObjectEvent::from_payload(&json!({"bucket": 3, "name": "f.pdf"})),
            Err(EventError::MissingKey("bucket"))
        );
        assert_eq!(
            StorageObjectEvent::from_payload(&json!(["b", "f.pdf"])),
            Err(EventError::NotAnObject)
        );
    }
}
