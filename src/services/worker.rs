use crate::config::WorkerConfig;
use crate::handlers::HandlerError;
use crate::handlers::queue_item::QueueItemHandler;
use crate::models::QueueMessage;
use crate::services::queue::QueueService;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, interval_at, sleep};

/// What happened to a single delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handled and deleted from the queue.
    Completed,
    /// Handler failed; the message reappears once its visibility timeout lapses.
    Failed,
    /// Delivered too many times; moved to the poison queue.
    Poisoned,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub completed: usize,
    pub failed: usize,
    pub poisoned: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Poisoned => self.poisoned += 1,
        }
    }
}

/// Idle polling interval: doubles on every empty poll, capped at `max`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl PollBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Delay to wait after an empty poll.
    pub fn next_idle(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Queue runtime: polls the queue and dispatches each message to the handler.
pub struct QueueWorker {
    queue: Arc<dyn QueueService>,
    handler: Arc<QueueItemHandler>,
    batch_size: u32,
    max_concurrency: usize,
    visibility_timeout: Duration,
    max_dequeue_count: u32,
    backoff: PollBackoff,
    shutdown: watch::Receiver<bool>,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn QueueService>,
        handler: Arc<QueueItemHandler>,
        config: &WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            handler,
            batch_size: config.batch_size,
            max_concurrency: config.max_concurrency.max(1),
            visibility_timeout: config.visibility_timeout(),
            max_dequeue_count: config.max_dequeue_count,
            backoff: PollBackoff::new(
                Duration::from_millis(config.min_poll_interval_ms),
                Duration::from_millis(config.max_poll_interval_ms),
            ),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Queue worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let summary = self.run_once().await;
            if summary.received > 0 {
                self.backoff.reset();
                continue;
            }

            let delay = self.backoff.next_idle();
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = sleep(delay) => {}
            }
        }

        tracing::info!("🛑 Queue worker shutting down");
    }

    /// Messages requested per poll. Never more than can be handled at once, so
    /// nothing sits in a local buffer while its visibility runs out.
    pub fn receive_size(&self) -> u32 {
        let concurrency = u32::try_from(self.max_concurrency).unwrap_or(u32::MAX);
        self.batch_size.min(concurrency).max(1)
    }

    /// How often visibility is extended while a message is being handled.
    pub fn renew_interval(&self) -> Duration {
        (self.visibility_timeout / 2).max(Duration::from_secs(1))
    }

    /// One receive/dispatch cycle. Receive failures count as an empty poll.
    pub async fn run_once(&self) -> BatchSummary {
        let messages = match self
            .queue
            .receive(self.receive_size(), self.visibility_timeout)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Failed to receive queue messages: {:#}", e);
                return BatchSummary::default();
            }
        };

        let mut summary = BatchSummary {
            received: messages.len(),
            ..BatchSummary::default()
        };
        if messages.is_empty() {
            return summary;
        }

        tracing::debug!("📬 Received {} message(s)", messages.len());

        let outcomes: Vec<Outcome> = futures::stream::iter(messages)
            .map(|message| async move { self.dispatch(&message).await })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            summary.record(outcome);
        }
        summary
    }

    pub async fn dispatch(&self, message: &QueueMessage) -> Outcome {
        if message.dequeue_count > self.max_dequeue_count {
            tracing::warn!(
                message_id = %message.id,
                dequeue_count = message.dequeue_count,
                "☠️  Message exceeded {} deliveries, moving to poison queue",
                self.max_dequeue_count
            );
            if let Err(e) = self.queue.send_to_poison(message).await {
                tracing::error!(message_id = %message.id, "Failed to poison message: {:#}", e);
                return Outcome::Failed;
            }
            self.delete(message).await;
            return Outcome::Poisoned;
        }

        let (result, current) = self.handle_with_renewal(message).await;
        match result {
            Ok(()) => {
                self.delete(&current).await;
                Outcome::Completed
            }
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    dequeue_count = message.dequeue_count,
                    malformed = e.is_malformed(),
                    "❌ Queue item failed: {}",
                    e
                );
                Outcome::Failed
            }
        }
    }

    /// Runs the handler while periodically pushing the message's visibility out.
    /// Returns the message carrying its latest pop receipt.
    async fn handle_with_renewal(
        &self,
        message: &QueueMessage,
    ) -> (Result<(), HandlerError>, QueueMessage) {
        let mut current = message.clone();
        let period = self.renew_interval();
        let mut renewal = interval_at(Instant::now() + period, period);

        let handling = self.handler.handle(message);
        tokio::pin!(handling);

        let result = loop {
            tokio::select! {
                result = &mut handling => break result,
                _ = renewal.tick() => {
                    match self.queue.renew(&current, self.visibility_timeout).await {
                        Ok(pop_receipt) => {
                            tracing::debug!(message_id = %current.id, "⏳ Extended message visibility");
                            current.pop_receipt = pop_receipt;
                        }
                        Err(e) => {
                            tracing::warn!(
                                message_id = %current.id,
                                "Failed to extend message visibility: {:#}",
                                e
                            );
                        }
                    }
                }
            }
        };
        (result, current)
    }

    async fn delete(&self, message: &QueueMessage) {
        if let Err(e) = self.queue.delete(message).await {
            // Not fatal: the message becomes visible again and is redelivered.
            tracing::error!(message_id = %message.id, "Failed to delete message: {:#}", e);
        }
    }
}
