/// Core error types for Cadence
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for Cadence
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The producer side of a chunked transfer went away before signalling completion
    #[error("Transfer ended without a completion signal")]
    TransferIncomplete,

    /// The consumer side of a chunked transfer was dropped
    #[error("Transfer receiver closed")]
    TransferClosed,

    /// Settings backend errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a settings error
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }
}
