//! Playback events
//!
//! Emitted synchronously by the transport after each transition so UIs can
//! subscribe instead of polling. Any debouncing of redraws belongs to the
//! subscriber.

use crate::output::ClockTime;
use crate::types::{RepeatMode, SchedulerState};
use cadence_core::TrackRef;
use serde::{Deserialize, Serialize};

/// Contents of all three queues at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Manual queue, next first
    pub manual: Vec<TrackRef>,
    /// Automatic queue, next first
    pub automatic: Vec<TrackRef>,
    /// History, oldest first
    pub history: Vec<TrackRef>,
}

/// Events emitted by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// Scheduler state changed
    StateChanged {
        /// The new state
        state: SchedulerState,
    },

    /// A different track became current
    TrackChanged {
        /// New current track
        track: TrackRef,
        /// Track it replaced
        previous: Option<TrackRef>,
        /// Whether the switch was a sample-accurate handoff
        gapless: bool,
    },

    /// The follower of the current track is armed on the output clock
    NextTrackScheduled {
        /// Track that will start
        track: TrackRef,
        /// Clock time it starts at
        start_at: ClockTime,
    },

    /// A queue was mutated
    QueueChanged(QueueSnapshot),

    /// Shuffle or repeat changed
    ModesChanged {
        shuffle: bool,
        repeat: RepeatMode,
    },

    /// Output gain changed
    VolumeChanged {
        /// Linear gain in `[0, 1]`
        volume: f32,
    },

    /// Playback rate changed
    SpeedChanged {
        /// Rate in `[0.25, 8]`, 1 is normal speed
        speed: f32,
    },

    /// A track could not be decoded
    DecodeFailed {
        track: TrackRef,
        message: String,
        /// The file is gone, as opposed to undecodable
        missing_file: bool,
    },

    /// Playback ended with nothing left to play, or was stopped
    Stopped,
}
