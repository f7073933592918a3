/// Audio output errors
use cadence_playback::PlaybackError;
use thiserror::Error;

/// Result type for audio output operations
pub type Result<T> = std::result::Result<T, OutputError>;

/// Audio output errors
#[derive(Debug, Error)]
pub enum OutputError {
    /// Device not found
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Device cannot play 48 kHz float samples
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to play stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// The audio thread is gone
    #[error("Audio thread stopped")]
    ThreadStopped,
}

impl From<cpal::BuildStreamError> for OutputError {
    fn from(err: cpal::BuildStreamError) -> Self {
        OutputError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for OutputError {
    fn from(err: cpal::PlayStreamError) -> Self {
        OutputError::PlayError(err.to_string())
    }
}

impl From<cpal::SupportedStreamConfigsError> for OutputError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        OutputError::DeviceError(err.to_string())
    }
}

impl From<OutputError> for PlaybackError {
    fn from(err: OutputError) -> Self {
        PlaybackError::Output(err.to_string())
    }
}
