use crate::handlers::error::HandlerError;
use crate::models::{FileQueueItem, QueueMessage, embeddings_added_metadata, validate_blob_name};
use crate::services::processor::DocumentProcessor;
use crate::services::storage::BlobStorageService;
use std::sync::Arc;
use tracing::{Span, info, instrument};

/// Handles one document-processing queue item:
/// sign a read URL for the blob, run the processor on it, then flag the blob
/// with `embeddings_added = "true"`.
///
/// Steps run strictly in order and the first failure is returned as-is. There
/// is no compensation when the metadata write fails after processing, and no
/// guard against the same message being delivered twice.
pub struct QueueItemHandler {
    storage: Arc<dyn BlobStorageService>,
    processor: Arc<dyn DocumentProcessor>,
}

impl QueueItemHandler {
    pub fn new(storage: Arc<dyn BlobStorageService>, processor: Arc<dyn DocumentProcessor>) -> Self {
        Self { storage, processor }
    }

    #[instrument(
        name = "queue_item",
        skip_all,
        fields(
            message_id = %message.id,
            dequeue_count = message.dequeue_count,
            filename = tracing::field::Empty,
        )
    )]
    pub async fn handle(&self, message: &QueueMessage) -> Result<(), HandlerError> {
        info!(
            "Queue trigger processed a queue item: {}",
            String::from_utf8_lossy(&message.body)
        );

        let item = decode_item(message)?;
        let filename = item.filename;
        Span::current().record("filename", filename.as_str());

        let source_url = self
            .storage
            .get_signed_url(&filename)
            .await
            .map_err(|source| HandlerError::SignedUrl {
                filename: filename.clone(),
                source,
            })?;

        self.processor
            .process(&source_url, &filename)
            .await
            .map_err(|source| HandlerError::Processing {
                filename: filename.clone(),
                source,
            })?;

        self.storage
            .set_metadata(&filename, &embeddings_added_metadata())
            .await
            .map_err(|source| HandlerError::Metadata {
                filename: filename.clone(),
                source,
            })?;

        info!("✅ Embeddings added for {}", filename);
        Ok(())
    }
}

/// Typed decode of the message body; `filename` must name a single blob.
pub fn decode_item(message: &QueueMessage) -> Result<FileQueueItem, HandlerError> {
    let text = message.text()?;
    let item: FileQueueItem = serde_json::from_str(text)
        .map_err(|e| HandlerError::MalformedMessage(format!("invalid queue item JSON: {}", e)))?;

    validate_blob_name(&item.filename).map_err(HandlerError::MalformedMessage)?;
    Ok(item)
}
