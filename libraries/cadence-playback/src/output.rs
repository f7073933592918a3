//! Audio output abstraction
//!
//! The scheduler talks to hardware through [`AudioOutput`]: a sample clock
//! plus the ability to start a buffer at an exact clock time and to stop it.
//! Every started source reports [`OutputEvent::SourceEnded`] exactly once,
//! whether it played out or was stopped, on the channel the output was
//! created with.

use crate::error::Result;
use cadence_core::{duration_to_frames, frames_to_duration, DecodedBuffer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Slowest accepted playback rate
pub const MIN_RATE: f32 = 0.25;

/// Fastest accepted playback rate
pub const MAX_RATE: f32 = 8.0;

/// Clock frames needed to play `source` buffer frames at `rate`
pub fn clock_frames(source: u64, rate: f32) -> u64 {
    if rate == 1.0 {
        return source;
    }
    (source as f64 / f64::from(rate)).ceil() as u64
}

/// Buffer frames played during `clock` clock frames at `rate`
pub fn source_frames(clock: u64, rate: f32) -> u64 {
    if rate == 1.0 {
        return clock;
    }
    (clock as f64 * f64::from(rate)).floor() as u64
}

/// Position on the output clock, in frames at 48 kHz
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ClockTime(u64);

impl ClockTime {
    pub const ZERO: Self = Self(0);

    pub fn from_frames(frames: u64) -> Self {
        Self(frames)
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(duration_to_frames(duration))
    }

    pub fn frames(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        frames_to_duration(self.0)
    }

    /// Clock time `frames` later
    pub fn after(self, frames: u64) -> Self {
        Self(self.0.saturating_add(frames))
    }

    /// Frames elapsed since `earlier`, zero if `earlier` is in the future
    pub fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_duration().as_secs_f64())
    }
}

/// Identity of one playback attempt on the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src-{}", self.0)
    }
}

/// Request to sound a buffer
#[derive(Debug, Clone)]
pub struct SourceRequest {
    /// Audio to play
    pub buffer: Arc<DecodedBuffer>,

    /// Clock time of the first audible frame
    pub start_at: ClockTime,

    /// Frame of `buffer` to start from
    pub offset_frames: u64,

    /// Buffer frames consumed per clock frame
    pub rate: f32,
}

impl SourceRequest {
    /// Clock time at which the last frame finishes
    pub fn end_at(&self) -> ClockTime {
        let remaining = (self.buffer.frames() as u64).saturating_sub(self.offset_frames);
        self.start_at.after(clock_frames(remaining, self.rate))
    }

    /// Buffer frame sounding at clock time `t`
    ///
    /// Before `start_at` this is the first frame.
    pub fn position_at(&self, t: ClockTime) -> u64 {
        self.offset_frames + source_frames(t.since(self.start_at), self.rate)
    }
}

/// Signals from the output back to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    /// A source finished or was stopped
    SourceEnded(SourceId),
}

/// Sample-clocked audio output
pub trait AudioOutput: Send {
    /// Current clock time
    fn now(&self) -> ClockTime;

    /// Frames between "now" and the earliest time a new source can start
    fn start_latency(&self) -> u64 {
        0
    }

    /// Schedule `request`; the source stays silent until `start_at`
    ///
    /// A start time already in the past skips the frames that would have
    /// played, keeping the source anchored to `start_at`.
    fn start(&mut self, request: SourceRequest) -> Result<SourceId>;

    /// Stop and disconnect a source; unknown ids are ignored
    fn stop(&mut self, id: SourceId);

    /// Linear output gain in `[0, 1]`
    fn set_volume(&mut self, volume: f32);
}
