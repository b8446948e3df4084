use crate::config::WorkerConfig;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

/// Turns a stored document into embeddings.
///
/// Fetching, chunking, embedding and indexing all happen behind this call;
/// the queue handler only sees success or failure.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self, source_url: &str, filename: &str) -> Result<()>;

    /// Check if the processor is available/healthy
    async fn health_check(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    source_url: &'a str,
    filename: &'a str,
}

/// Processor reached over HTTP: `POST {"source_url", "filename"}` as JSON.
pub struct HttpDocumentProcessor {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpDocumentProcessor {
    pub fn new(client: Client, endpoint: &str, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid processor endpoint: {}", endpoint))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.processor_timeout())
            .build()
            .context("Failed to create processor HTTP client")?;
        Self::new(
            client,
            &config.processor_endpoint,
            config.processor_api_key.clone(),
        )
    }
}

#[async_trait]
impl DocumentProcessor for HttpDocumentProcessor {
    async fn process(&self, source_url: &str, filename: &str) -> Result<()> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&ProcessRequest {
                source_url,
                filename,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Document processor request failed for {}", filename))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Document processor returned {} for {}: {}",
                status,
                filename,
                body
            ));
        }

        tracing::debug!("Document processor accepted {} ({})", filename, status);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        // Any HTTP answer means the processor is listening; only transport errors count.
        match self.client.head(self.endpoint.clone()).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Document processor unreachable: {}", e);
                false
            }
        }
    }
}

/// No-op processor for development/testing
pub struct NoOpProcessor;

#[async_trait]
impl DocumentProcessor for NoOpProcessor {
    async fn process(&self, _source_url: &str, filename: &str) -> Result<()> {
        tracing::warn!("NoOpProcessor: Skipping processing of {} (development mode)", filename);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Factory function to create the processor named in the config.
///
/// Unknown types are an error: falling back to the no-op processor would flag
/// blobs as embedded without processing them.
pub fn create_processor(config: &WorkerConfig) -> Result<Box<dyn DocumentProcessor>> {
    match config.processor_type.to_lowercase().as_str() {
        "http" => Ok(Box::new(HttpDocumentProcessor::from_config(config)?)),
        "noop" | "none" | "disabled" => Ok(Box::new(NoOpProcessor)),
        other => Err(anyhow!(
            "Unknown processor type '{}', expected http or noop",
            other
        )),
    }
}
