use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Malformed message: body is not valid UTF-8")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Failed to sign URL for {filename}: {source:#}")]
    SignedUrl {
        filename: String,
        source: anyhow::Error,
    },

    #[error("Processing failed for {filename}: {source:#}")]
    Processing {
        filename: String,
        source: anyhow::Error,
    },

    #[error("Failed to update metadata for {filename}: {source:#}")]
    Metadata {
        filename: String,
        source: anyhow::Error,
    },
}

impl HandlerError {
    /// The message itself is bad; redelivery cannot help.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            HandlerError::InvalidEncoding(_) | HandlerError::MalformedMessage(_)
        )
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            HandlerError::SignedUrl { filename, .. }
            | HandlerError::Processing { filename, .. }
            | HandlerError::Metadata { filename, .. } => Some(filename),
            _ => None,
        }
    }
}
