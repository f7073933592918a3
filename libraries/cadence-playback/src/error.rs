//! Error types for playback management

use crate::output::ClockTime;
use cadence_decoder::DecodeError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Seek target lies outside the current track
    #[error("Invalid seek position: {0:?}")]
    InvalidSeekPosition(std::time::Duration),

    /// Decoding the requested track failed
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The current source ends before a follower could start
    #[error("Follower too late: current ends at {start_at}, earliest start is {earliest}")]
    FollowerTooLate {
        /// Where the follower would have started
        start_at: ClockTime,
        /// Earliest time the output can start a source
        earliest: ClockTime,
    },

    /// Audio output refused a request
    #[error("Audio output error: {0}")]
    Output(String),

    /// Invalid operation for the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
