/// Decoded audio types
use crate::error::{CoreError, Result};
use std::time::Duration;

/// Sample rate of every decoded buffer and of the playback clock
pub const SAMPLE_RATE: u32 = 48_000;

/// Channel count of every decoded buffer
pub const CHANNELS: usize = 2;

/// Convert a frame count at [`SAMPLE_RATE`] into a duration
pub fn frames_to_duration(frames: u64) -> Duration {
    Duration::from_secs_f64(frames as f64 / f64::from(SAMPLE_RATE))
}

/// Convert a duration into a frame count at [`SAMPLE_RATE`], rounding down
pub fn duration_to_frames(duration: Duration) -> u64 {
    (duration.as_secs_f64() * f64::from(SAMPLE_RATE)) as u64
}

/// Fully decoded track
///
/// Samples are stored planar (one `Vec<f32>` per channel) at 48 kHz stereo.
/// A buffer is immutable once produced and is shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    channels: [Vec<f32>; CHANNELS],
}

impl DecodedBuffer {
    /// Build a buffer from planar left/right channels
    ///
    /// # Errors
    /// Returns `InvalidInput` if the channels differ in length
    pub fn from_planar(left: Vec<f32>, right: Vec<f32>) -> Result<Self> {
        if left.len() != right.len() {
            return Err(CoreError::invalid_input(format!(
                "channel length mismatch: left {} frames, right {} frames",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            channels: [left, right],
        })
    }

    /// Silent buffer of `frames` frames
    pub fn silence(frames: usize) -> Self {
        Self {
            channels: [vec![0.0; frames], vec![0.0; frames]],
        }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Samples of one channel (0 = left, 1 = right)
    ///
    /// # Panics
    /// Panics if `index >= CHANNELS`
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Channel count
    pub fn channel_count(&self) -> usize {
        CHANNELS
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(SAMPLE_RATE)
    }

    /// Total duration, derived from frame count and sample rate
    pub fn duration(&self) -> Duration {
        frames_to_duration(self.frames() as u64)
    }

    /// Check if the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}
