#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use doc_embeddings_worker::models::QueueMessage;
use doc_embeddings_worker::services::processor::DocumentProcessor;
use doc_embeddings_worker::services::queue::QueueService;
use doc_embeddings_worker::services::storage::BlobStorageService;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One collaborator call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SignedUrl(String),
    Process { source_url: String, filename: String },
    SetMetadata(String, HashMap<String, String>),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct RecordingStorage {
    pub calls: CallLog,
    pub fail_signed_url: bool,
    pub fail_metadata: bool,
}

impl RecordingStorage {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            fail_signed_url: false,
            fail_metadata: false,
        }
    }
}

#[async_trait]
impl BlobStorageService for RecordingStorage {
    async fn get_signed_url(&self, name: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::SignedUrl(name.to_string()));
        if self.fail_signed_url {
            return Err(anyhow!("signing unavailable"));
        }
        Ok(format!("https://blob/{}?sig=...", name))
    }

    async fn set_metadata(&self, name: &str, fields: &HashMap<String, String>) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::SetMetadata(name.to_string(), fields.clone()));
        if self.fail_metadata {
            return Err(anyhow!("metadata write rejected"));
        }
        Ok(())
    }

    async fn get_metadata(&self, _name: &str) -> Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

pub struct RecordingProcessor {
    pub calls: CallLog,
    pub fail: bool,
    /// Time each `process` call takes.
    pub delay: Duration,
}

impl RecordingProcessor {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing(calls: CallLog) -> Self {
        Self {
            fail: true,
            ..Self::new(calls)
        }
    }

    pub fn slow(calls: CallLog, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(calls)
        }
    }
}

#[async_trait]
impl DocumentProcessor for RecordingProcessor {
    async fn process(&self, source_url: &str, filename: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Process {
            source_url: source_url.to_string(),
            filename: filename.to_string(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(anyhow!("embedding service returned 500"));
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.fail
    }
}

/// Queue double holding a fixed set of pending messages.
#[derive(Default)]
pub struct InMemoryQueue {
    pub pending: Mutex<Vec<QueueMessage>>,
    pub deleted: Mutex<Vec<String>>,
    /// Pop receipts presented on delete, in order.
    pub deleted_receipts: Mutex<Vec<String>>,
    pub poisoned: Mutex<Vec<String>>,
    /// (message id, pop receipt presented) per renewal.
    pub renewals: Mutex<Vec<(String, String)>>,
    /// Largest `max_messages` requested by a receive call.
    pub largest_request: Mutex<u32>,
    pub receive_calls: Mutex<usize>,
    pub fail_receive: bool,
}

impl InMemoryQueue {
    pub fn with_messages(messages: Vec<QueueMessage>) -> Self {
        Self {
            pending: Mutex::new(messages),
            ..Self::default()
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn poisoned(&self) -> Vec<String> {
        self.poisoned.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueService for InMemoryQueue {
    async fn receive(
        &self,
        max_messages: u32,
        _visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        *self.receive_calls.lock().unwrap() += 1;
        {
            let mut largest = self.largest_request.lock().unwrap();
            *largest = (*largest).max(max_messages);
        }
        if self.fail_receive {
            return Err(anyhow!("queue unavailable"));
        }
        let mut pending = self.pending.lock().unwrap();
        let take = (max_messages as usize).min(pending.len());
        Ok(pending.drain(..take).collect())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        self.deleted.lock().unwrap().push(message.id.clone());
        self.deleted_receipts
            .lock()
            .unwrap()
            .push(message.pop_receipt.clone());
        Ok(())
    }

    async fn renew(&self, message: &QueueMessage, _visibility_timeout: Duration) -> Result<String> {
        let mut renewals = self.renewals.lock().unwrap();
        renewals.push((message.id.clone(), message.pop_receipt.clone()));
        Ok(format!("{}-renewed-{}", message.id, renewals.len()))
    }

    async fn send_to_poison(&self, message: &QueueMessage) -> Result<()> {
        self.poisoned.lock().unwrap().push(message.raw_text.clone());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.fail_receive
    }
}

pub fn message(id: &str, body: impl Into<Vec<u8>>) -> QueueMessage {
    QueueMessage::from_body(id, body)
}

pub fn redelivered(id: &str, body: &str, dequeue_count: u32) -> QueueMessage {
    QueueMessage {
        dequeue_count,
        pop_receipt: format!("receipt-{}", id),
        ..QueueMessage::from_body(id, body)
    }
}
