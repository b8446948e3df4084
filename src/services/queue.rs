use crate::config::{MAX_QUEUE_BATCH_SIZE, MessageEncoding};
use crate::models::QueueMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_storage_queues::prelude::*;
use azure_storage_queues::PopReceiptClient;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use std::time::Duration;
use time::OffsetDateTime;

#[async_trait]
pub trait QueueService: Send + Sync {
    /// Fetch up to `max_messages`, hiding them from other consumers for `visibility_timeout`.
    async fn receive(
        &self,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>>;
    async fn delete(&self, message: &QueueMessage) -> Result<()>;
    /// Push the message's visibility out by `visibility_timeout` while it is still being
    /// handled. Returns the new pop receipt; the old one stops working.
    async fn renew(&self, message: &QueueMessage, visibility_timeout: Duration) -> Result<String>;
    /// Park a message on the poison queue, preserving its original text.
    async fn send_to_poison(&self, message: &QueueMessage) -> Result<()>;
    async fn health_check(&self) -> bool;
}

impl MessageEncoding {
    pub fn decode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            MessageEncoding::Base64 => BASE64
                .decode(text.trim())
                .context("Queue message is not valid base64"),
            MessageEncoding::None => Ok(text.as_bytes().to_vec()),
        }
    }
}

/// Payload of a received message. Text that fails to decode is handed over as-is
/// so the handler reports it as malformed.
pub fn decode_body(message_id: &str, text: &str, encoding: MessageEncoding) -> Vec<u8> {
    encoding.decode(text).unwrap_or_else(|e| {
        tracing::warn!(
            message_id = %message_id,
            "{:#}; handing the raw text to the handler",
            e
        );
        text.as_bytes().to_vec()
    })
}

fn to_chrono(value: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.unix_timestamp(), value.nanosecond())
}

pub struct AzureQueueService {
    queue: QueueClient,
    poison: QueueClient,
    queue_name: String,
    poison_queue_name: String,
    encoding: MessageEncoding,
}

impl AzureQueueService {
    pub fn new(
        service: &QueueServiceClient,
        queue_name: impl Into<String>,
        encoding: MessageEncoding,
    ) -> Self {
        let queue_name = queue_name.into();
        let poison_queue_name = format!("{}-poison", queue_name);
        Self {
            queue: service.queue_client(queue_name.clone()),
            poison: service.queue_client(poison_queue_name.clone()),
            queue_name,
            poison_queue_name,
            encoding,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn poison_queue_name(&self) -> &str {
        &self.poison_queue_name
    }

    /// Create Queue; succeeds when the queue already exists.
    pub async fn create_queue_if_not_exists(&self) -> Result<()> {
        self.queue
            .create()
            .await
            .with_context(|| format!("Failed to create queue '{}'", self.queue_name))?;
        Ok(())
    }

    fn pop_receipt_client(&self, message: &QueueMessage) -> PopReceiptClient {
        self.queue.pop_receipt_client(PopReceipt::new(
            message.id.clone(),
            message.pop_receipt.clone(),
        ))
    }
}

#[async_trait]
impl QueueService for AzureQueueService {
    async fn receive(
        &self,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        let count = max_messages.clamp(1, MAX_QUEUE_BATCH_SIZE) as u8;
        let visibility = visibility_timeout.max(Duration::from_secs(1));

        let response = self
            .queue
            .get_messages()
            .number_of_messages(NumberOfMessages::new(count))
            .visibility_timeout(VisibilityTimeout::new(visibility))
            .await
            .with_context(|| format!("Failed to receive from queue '{}'", self.queue_name))?;

        Ok(response
            .messages
            .into_iter()
            .map(|message| QueueMessage {
                body: decode_body(&message.message_id, &message.message_text, self.encoding),
                insertion_time: to_chrono(message.insertion_time),
                expiration_time: to_chrono(message.expiration_time),
                dequeue_count: u32::try_from(message.dequeue_count).unwrap_or(u32::MAX),
                id: message.message_id,
                pop_receipt: message.pop_receipt,
                raw_text: message.message_text,
            })
            .collect())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        self.pop_receipt_client(message)
            .delete()
            .await
            .with_context(|| format!("Failed to delete message {}", message.id))?;
        Ok(())
    }

    async fn renew(&self, message: &QueueMessage, visibility_timeout: Duration) -> Result<String> {
        let response = self
            .pop_receipt_client(message)
            .update(
                message.raw_text.clone(),
                VisibilityTimeout::new(visibility_timeout.max(Duration::from_secs(1))),
            )
            .await
            .with_context(|| format!("Failed to extend visibility of message {}", message.id))?;
        Ok(response.pop_receipt)
    }

    async fn send_to_poison(&self, message: &QueueMessage) -> Result<()> {
        self.poison.create().await.with_context(|| {
            format!("Failed to create poison queue '{}'", self.poison_queue_name)
        })?;
        self.poison
            .put_message(message.raw_text.clone())
            .await
            .with_context(|| format!("Failed to poison message {}", message.id))?;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.queue.get_metadata().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Queue health check failed: {}", e);
                false
            }
        }
    }
}
