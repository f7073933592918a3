//! Playback session state

use crate::output::ClockTime;
use crate::types::RepeatMode;
use cadence_core::TrackRef;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// State of the single playback session
///
/// Owned by the transport and lent to the scheduler and queue manager for
/// each transition. Nothing else holds playback flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSession {
    /// Track loaded for playback
    pub current_track: Option<TrackRef>,

    /// Track that was current before it
    pub previous_track: Option<TrackRef>,

    /// Resolved follower of the current track
    pub next_track: Option<TrackRef>,

    /// Whether audio is sounding
    pub playing: bool,

    /// Offset into the current track captured on pause
    pub paused_at: Duration,

    /// Clock time at which the current segment started sounding
    pub playback_start: ClockTime,

    /// Track offset the current segment started from
    pub start_offset: Duration,

    /// Shuffle flag
    pub shuffle: bool,

    /// Repeat mode
    pub repeat: RepeatMode,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything but the user's shuffle and repeat choices
    pub fn reset(&mut self) {
        *self = Self {
            shuffle: self.shuffle,
            repeat: self.repeat,
            ..Self::default()
        };
    }

    pub fn is_current(&self, track: &TrackRef) -> bool {
        self.current_track.as_ref() == Some(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_modes() {
        let mut session = PlaybackSession {
            current_track: Some(TrackRef::from("/music/a.mp3")),
            playing: true,
            paused_at: Duration::from_secs(4),
            shuffle: true,
            repeat: RepeatMode::Set,
            ..Default::default()
        };

        session.reset();

        assert_eq!(session.current_track, None);
        assert!(!session.playing);
        assert_eq!(session.paused_at, Duration::ZERO);
        assert!(session.shuffle);
        assert_eq!(session.repeat, RepeatMode::Set);
    }
}
