use azure_storage::{CloudLocation, StorageCredentials};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Azurite's published development account key.
pub const DEV_STORAGE_ACCOUNT: &str = "devstoreaccount1";
pub const DEV_STORAGE_ACCESS_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Azure Storage Queue's upper bound for messages per receive call.
pub const MAX_QUEUE_BATCH_SIZE: u32 = 32;

/// How `MessageText` is encoded on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEncoding {
    /// Base64 of the UTF-8 payload (Azure Functions default).
    Base64,
    /// Payload stored as-is.
    None,
}

impl FromStr for MessageEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "none" | "raw" | "text" => Ok(Self::None),
            other => Err(format!("unknown message encoding '{}'", other)),
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Storage account name (default: "devstoreaccount1")
    pub storage_account: String,

    /// Storage account key, base64 (default: Azurite key)
    pub storage_access_key: String,

    /// Container holding the documents (default: "documents")
    pub blob_container: String,

    /// Blob service endpoint override, e.g. Azurite's `http://127.0.0.1:10000/devstoreaccount1`
    pub blob_endpoint: Option<String>,

    /// Queue carrying `{"filename": ...}` items (default: "doc-processing")
    pub queue_name: String,

    /// Queue service endpoint override
    pub queue_endpoint: Option<String>,

    /// Queue message encoding (default: base64)
    pub message_encoding: MessageEncoding,

    /// Lifetime of signed blob URLs in seconds (default: 3 hours)
    pub sas_expiry_secs: u64,

    /// Messages fetched per poll (default: 16, max 32)
    pub batch_size: u32,

    /// Messages handled at the same time (default: 8)
    pub max_concurrency: usize,

    /// Seconds a received message stays invisible to other consumers (default: 300)
    pub visibility_timeout_secs: u64,

    /// Deliveries allowed before a message is moved to the poison queue (default: 5)
    pub max_dequeue_count: u32,

    /// Idle polling interval bounds in milliseconds (default: 100 / 60000)
    pub min_poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,

    /// Processor type: "http" or "noop" (default: "http")
    pub processor_type: String,

    /// Document processor endpoint (default: "http://127.0.0.1:7071/api/process")
    pub processor_endpoint: String,

    /// Bearer token for the document processor
    pub processor_api_key: Option<String>,

    /// Processor request timeout in seconds (default: 600)
    pub processor_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            storage_account: DEV_STORAGE_ACCOUNT.to_string(),
            storage_access_key: DEV_STORAGE_ACCESS_KEY.to_string(),
            blob_container: "documents".to_string(),
            blob_endpoint: None,
            queue_name: "doc-processing".to_string(),
            queue_endpoint: None,
            message_encoding: MessageEncoding::Base64,
            sas_expiry_secs: 3 * 60 * 60, // 3 hours
            batch_size: 16,
            max_concurrency: 8,
            visibility_timeout_secs: 300,
            max_dequeue_count: 5,
            min_poll_interval_ms: 100,
            max_poll_interval_ms: 60_000,
            processor_type: "http".to_string(),
            processor_endpoint: "http://127.0.0.1:7071/api/process".to_string(),
            processor_api_key: None,
            processor_timeout_secs: 600,
        }
    }
}

fn parse_env<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("⚠️  Ignoring {}={:?}: {}; using the default", key, raw, e);
            None
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_account: env::var("AZURE_STORAGE_ACCOUNT").unwrap_or(default.storage_account),
            storage_access_key: env::var("AZURE_STORAGE_ACCESS_KEY")
                .unwrap_or(default.storage_access_key),
            blob_container: env::var("AZURE_BLOB_CONTAINER").unwrap_or(default.blob_container),
            blob_endpoint: env::var("AZURE_BLOB_ENDPOINT").ok(),
            queue_name: env::var("AZURE_QUEUE_NAME").unwrap_or(default.queue_name),
            queue_endpoint: env::var("AZURE_QUEUE_ENDPOINT").ok(),
            message_encoding: parse_env("QUEUE_MESSAGE_ENCODING")
                .unwrap_or(default.message_encoding),
            sas_expiry_secs: parse_env("SAS_EXPIRY_SECS").unwrap_or(default.sas_expiry_secs),
            batch_size: parse_env::<u32>("QUEUE_BATCH_SIZE")
                .unwrap_or(default.batch_size)
                .clamp(1, MAX_QUEUE_BATCH_SIZE),
            max_concurrency: parse_env::<usize>("QUEUE_MAX_CONCURRENCY")
                .unwrap_or(default.max_concurrency)
                .max(1),
            visibility_timeout_secs: parse_env("QUEUE_VISIBILITY_TIMEOUT_SECS")
                .unwrap_or(default.visibility_timeout_secs),
            max_dequeue_count: parse_env("QUEUE_MAX_DEQUEUE_COUNT")
                .unwrap_or(default.max_dequeue_count),
            min_poll_interval_ms: parse_env("QUEUE_MIN_POLL_INTERVAL_MS")
                .unwrap_or(default.min_poll_interval_ms),
            max_poll_interval_ms: parse_env("QUEUE_MAX_POLL_INTERVAL_MS")
                .unwrap_or(default.max_poll_interval_ms),
            processor_type: env::var("PROCESSOR_TYPE").unwrap_or(default.processor_type),
            processor_endpoint: env::var("PROCESSOR_ENDPOINT")
                .unwrap_or(default.processor_endpoint),
            processor_api_key: env::var("PROCESSOR_API_KEY").ok(),
            processor_timeout_secs: parse_env("PROCESSOR_TIMEOUT_SECS")
                .unwrap_or(default.processor_timeout_secs),
        }
    }

    /// Create config for development (Azurite endpoints, no-op processor)
    pub fn development() -> Self {
        Self {
            blob_endpoint: Some(format!("http://127.0.0.1:10000/{}", DEV_STORAGE_ACCOUNT)),
            queue_endpoint: Some(format!("http://127.0.0.1:10001/{}", DEV_STORAGE_ACCOUNT)),
            processor_type: "noop".to_string(),
            min_poll_interval_ms: 100,
            max_poll_interval_ms: 2_000,
            ..Self::default()
        }
    }

    /// Create config for production (real account credentials required)
    pub fn production() -> Self {
        Self {
            storage_account: env::var("AZURE_STORAGE_ACCOUNT")
                .expect("CRITICAL: AZURE_STORAGE_ACCOUNT must be set"),
            storage_access_key: env::var("AZURE_STORAGE_ACCESS_KEY")
                .expect("CRITICAL: AZURE_STORAGE_ACCESS_KEY must be set"),
            ..Self::from_env()
        }
    }

    pub fn blob_endpoint(&self) -> String {
        self.blob_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", self.storage_account))
    }

    pub fn queue_endpoint(&self) -> String {
        self.queue_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.queue.core.windows.net", self.storage_account))
    }

    /// Shared Key credentials for both the blob and queue clients.
    pub fn credentials(&self) -> StorageCredentials {
        StorageCredentials::access_key(
            self.storage_account.clone(),
            self.storage_access_key.clone(),
        )
    }

    pub fn blob_location(&self) -> CloudLocation {
        self.location(self.blob_endpoint.as_deref())
    }

    pub fn queue_location(&self) -> CloudLocation {
        self.location(self.queue_endpoint.as_deref())
    }

    fn location(&self, endpoint: Option<&str>) -> CloudLocation {
        match endpoint {
            Some(uri) => CloudLocation::Custom {
                account: self.storage_account.clone(),
                uri: uri.trim_end_matches('/').to_string(),
            },
            None => CloudLocation::Public {
                account: self.storage_account.clone(),
            },
        }
    }

    pub fn sas_expiry(&self) -> Duration {
        Duration::from_secs(self.sas_expiry_secs)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn processor_timeout(&self) -> Duration {
        Duration::from_secs(self.processor_timeout_secs)
    }
}
