use crate::config::WorkerConfig;
use crate::services::queue::AzureQueueService;
use azure_storage_queues::QueueServiceClientBuilder;
use std::sync::Arc;
use tracing::info;

pub async fn setup_queue(config: &WorkerConfig) -> anyhow::Result<Arc<AzureQueueService>> {
    info!(
        "📨 Queue Storage: {} (Queue: {}, Encoding: {:?})",
        config.queue_endpoint(),
        config.queue_name,
        config.message_encoding
    );

    let client =
        QueueServiceClientBuilder::with_location(config.queue_location(), config.credentials())
            .build();
    let queue = AzureQueueService::new(&client, config.queue_name.clone(), config.message_encoding);

    // Ensure queue exists
    match queue.create_queue_if_not_exists().await {
        Ok(()) => info!(
            "✅ Queue '{}' is ready (poison queue: '{}')",
            queue.queue_name(),
            queue.poison_queue_name()
        ),
        Err(e) => tracing::error!("❌ {:#}", e),
    }

    Ok(Arc::new(queue))
}
