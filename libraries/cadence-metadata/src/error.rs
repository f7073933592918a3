/// Metadata-specific errors
use cadence_core::CoreError;
use thiserror::Error;

/// Result type alias using `MetadataError`
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Metadata error types
#[derive(Error, Debug)]
pub enum MetadataError {
    /// File or directory not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Picture payload could not be decoded
    #[error("Malformed picture payload: {0}")]
    Payload(String),

    /// Import worker panicked or was cancelled
    #[error("Import worker failed: {0}")]
    Worker(String),

    /// Chunked transfer failed
    #[error(transparent)]
    Transfer(#[from] CoreError),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<MetadataError> for CoreError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Transfer(inner) => inner,
            MetadataError::Io(inner) => CoreError::Io(inner),
            other => CoreError::invalid_input(other.to_string()),
        }
    }
}
