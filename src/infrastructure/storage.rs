use crate::config::WorkerConfig;
use crate::services::storage::{AzureBlobStorageService, BlobStorageService};
use azure_storage_blobs::prelude::ClientBuilder;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &WorkerConfig) -> anyhow::Result<Arc<AzureBlobStorageService>> {
    info!(
        "☁️  Blob Storage: {} (Container: {})",
        config.blob_endpoint(),
        config.blob_container
    );

    let client = ClientBuilder::with_location(config.blob_location(), config.credentials())
        .blob_service_client();
    let storage =
        AzureBlobStorageService::new(&client, &config.blob_container, config.sas_expiry());

    if storage.health_check().await {
        info!("✅ Container '{}' is reachable", storage.container());
    } else {
        tracing::warn!(
            "⚠️  Container '{}' unreachable! Queue items will fail until it is available.",
            storage.container()
        );
    }

    Ok(Arc::new(storage))
}
