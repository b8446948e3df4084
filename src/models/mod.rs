use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key written onto a blob once its embeddings are stored.
pub const EMBEDDINGS_ADDED_KEY: &str = "embeddings_added";

/// Metadata fields recording that a blob has been processed.
pub fn embeddings_added_metadata() -> HashMap<String, String> {
    HashMap::from([(EMBEDDINGS_ADDED_KEY.to_string(), "true".to_string())])
}

/// Checks that `name` addresses exactly one blob.
///
/// `.` and `..` path segments are rejected: URL normalization would resolve
/// them to a different blob than the one named.
pub fn validate_blob_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("filename must not be empty".to_string());
    }
    if name.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(format!(
            "filename '{}' contains '.' or '..' path segments",
            name
        ));
    }
    Ok(())
}

/// One message as delivered by the queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: String,
    /// Token required to delete the message; changes on every receive.
    pub pop_receipt: String,
    pub dequeue_count: u32,
    pub insertion_time: Option<DateTime<Utc>>,
    pub expiration_time: Option<DateTime<Utc>>,
    /// Decoded payload.
    pub body: Vec<u8>,
    /// `MessageText` exactly as stored on the queue (still encoded).
    pub raw_text: String,
}

impl QueueMessage {
    /// Message built locally from a payload, with no queue envelope.
    pub fn from_body(id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            id: id.into(),
            pop_receipt: String::new(),
            dequeue_count: 1,
            insertion_time: None,
            expiration_time: None,
            raw_text: String::from_utf8_lossy(&body).into_owned(),
            body,
        }
    }

    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

/// Payload of a document-processing queue item: `{"filename": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileQueueItem {
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_keeps_payload() {
        let msg = QueueMessage::from_body("m1", r#"{"filename":"doc1.pdf"}"#);
        assert_eq!(msg.text().unwrap(), r#"{"filename":"doc1.pdf"}"#);
        assert_eq!(msg.raw_text, r#"{"filename":"doc1.pdf"}"#);
        assert_eq!(msg.dequeue_count, 1);
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let msg = QueueMessage::from_body("m1", vec![0xff, 0xfe, 0x00]);
        assert!(msg.text().is_err());
    }

    #[test]
    fn test_queue_item_ignores_extra_fields() {
        let item: FileQueueItem =
            serde_json::from_str(r#"{"filename":"a.pdf","size":10}"#).unwrap();
        assert_eq!(item.filename, "a.pdf");
    }

    #[test]
    fn test_validate_blob_name() {
        assert!(validate_blob_name("report.docx").is_ok());
        assert!(validate_blob_name("contracts/2024/v1..final.pdf").is_ok());
        assert!(validate_blob_name(".hidden/a.pdf").is_ok());
        assert!(validate_blob_name("   ").is_err());
        assert!(validate_blob_name("a/../b.pdf").is_err());
        assert!(validate_blob_name("./a.pdf").is_err());
        assert!(validate_blob_name("a/..").is_err());
    }

    #[test]
    fn test_embeddings_added_metadata() {
        let meta = embeddings_added_metadata();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("embeddings_added").map(String::as_str), Some("true"));
    }
}
