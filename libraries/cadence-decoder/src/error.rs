//! Decode error types

use cadence_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Decode errors
///
/// `Clone` so a single in-flight result can be handed to every caller waiting
/// on the same track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Track reference no longer resolves to a readable file
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// External decode process exited unsuccessfully
    #[error("Decode process failed ({status}): {stderr}")]
    ProcessFailed {
        /// Exit status description
        status: String,
        /// Captured stderr, trimmed
        stderr: String,
    },

    /// External decode process could not be started
    #[error("Failed to start decode process: {0}")]
    Spawn(String),

    /// Decoder output could not be turned into a buffer
    #[error("Malformed decoder output: {0}")]
    Malformed(String),

    /// No decode path for this track
    #[error("Unsupported track: {0}")]
    Unsupported(String),

    /// Chiptune renderer failed
    #[error("Chiptune renderer failed: {0}")]
    Renderer(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl DecodeError {
    /// Whether the failure was a vanished file rather than a broken decode
    pub fn is_missing_file(&self) -> bool {
        matches!(self, Self::MissingFile(_))
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<CoreError> for DecodeError {
    fn from(err: CoreError) -> Self {
        Self::Malformed(err.to_string())
    }
}
