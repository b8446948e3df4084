use crate::config::WorkerConfig;
use crate::services::processor::DocumentProcessor;
use std::sync::Arc;
use tracing::info;

pub async fn setup_processor(config: &WorkerConfig) -> anyhow::Result<Arc<dyn DocumentProcessor>> {
    let processor = crate::services::processor::create_processor(config)?;

    // Warm up processor connection
    if processor.health_check().await {
        info!(
            "🧠 Document processor ready ({})",
            config.processor_type.to_lowercase()
        );
    } else {
        tracing::warn!(
            "⚠️  Document processor unreachable at {}! Queue items will fail until it is available.",
            config.processor_endpoint
        );
    }

    Ok(processor.into())
}
