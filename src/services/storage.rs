use crate::models::validate_blob_name;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use azure_core::request_options::Metadata;
use azure_storage::shared_access_signature::service_sas::BlobSasPermissions;
use azure_storage_blobs::prelude::*;
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;

#[async_trait]
pub trait BlobStorageService: Send + Sync {
    /// Read-only URL for `name`, valid for the configured expiry window.
    async fn get_signed_url(&self, name: &str) -> Result<String>;
    /// Merges `fields` into the blob's existing metadata.
    async fn set_metadata(&self, name: &str, fields: &HashMap<String, String>) -> Result<()>;
    async fn get_metadata(&self, name: &str) -> Result<HashMap<String, String>>;
    async fn health_check(&self) -> bool;
}

/// Overlays `fields` on `existing`. Metadata names are case-insensitive, so keys are lowercased.
pub fn merge_metadata(
    existing: HashMap<String, String>,
    fields: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = existing
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect();
    for (key, value) in fields {
        merged.insert(key.to_lowercase(), value.clone());
    }
    merged
}

pub struct AzureBlobStorageService {
    container: ContainerClient,
    sas_expiry: Duration,
}

impl AzureBlobStorageService {
    pub fn new(service: &BlobServiceClient, container: &str, sas_expiry: Duration) -> Self {
        Self {
            container: service.container_client(container),
            sas_expiry,
        }
    }

    pub fn container(&self) -> &str {
        self.container.container_name()
    }

    fn blob_client(&self, name: &str) -> Result<BlobClient> {
        validate_blob_name(name).map_err(|e| anyhow!(e))?;
        Ok(self.container.blob_client(name))
    }
}

#[async_trait]
impl BlobStorageService for AzureBlobStorageService {
    async fn get_signed_url(&self, name: &str) -> Result<String> {
        let blob = self.blob_client(name)?;
        let expiry = OffsetDateTime::now_utc() + self.sas_expiry;
        let permissions = BlobSasPermissions {
            read: true,
            ..Default::default()
        };

        let sas = blob
            .shared_access_signature(permissions, expiry)
            .await
            .with_context(|| format!("Failed to create SAS for {}", name))?;
        let url = blob
            .generate_signed_blob_url(&sas)
            .with_context(|| format!("Failed to build signed URL for {}", name))?;

        tracing::debug!(blob = %name, expires_at = %expiry, "Generated blob SAS URL");
        Ok(url.to_string())
    }

    async fn set_metadata(&self, name: &str, fields: &HashMap<String, String>) -> Result<()> {
        // Set Blob Metadata replaces the whole set, so merge with what is there.
        let existing = self.get_metadata(name).await?;

        let mut metadata = Metadata::new();
        for (key, value) in merge_metadata(existing, fields) {
            metadata.insert(key, value);
        }

        self.blob_client(name)?
            .set_metadata()
            .metadata(metadata)
            .await
            .with_context(|| format!("Failed to set metadata on {}", name))?;
        Ok(())
    }

    async fn get_metadata(&self, name: &str) -> Result<HashMap<String, String>> {
        let properties = self
            .blob_client(name)?
            .get_properties()
            .await
            .with_context(|| format!("Failed to read properties of {}", name))?;
        Ok(properties.blob.metadata.unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        match self.container.get_properties().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Blob storage health check failed: {}", e);
                false
            }
        }
    }
}
