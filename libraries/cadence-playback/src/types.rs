//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when the queues run dry
    #[default]
    Off,

    /// Loop the set that was queued when repeat was engaged
    Set,

    /// Replay the current track forever
    File,
}

impl RepeatMode {
    /// Next mode in the off → set → file → off cycle
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::Set,
            Self::Set => Self::File,
            Self::File => Self::Off,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Set => "set",
            Self::File => "file",
        };
        f.write_str(name)
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "set" | "all" => Ok(Self::Set),
            "file" | "one" => Ok(Self::File),
            other => Err(format!("unknown repeat mode '{}'", other)),
        }
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Nothing is sounding
    #[default]
    Idle,

    /// A source is playing against the clock
    Playing,

    /// Stopped mid-track, offset retained
    Paused,

    /// Restarting at a new offset (transient)
    SeekingRestart,
}

/// One of the three queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKind {
    /// User-curated "play next" list
    Manual,

    /// Derived from the view, shuffle or repeat mode
    Automatic,

    /// Previously played tracks
    History,
}

/// How a track came to be started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Chosen directly from the active view
    View,

    /// Head of the manual queue
    Manual,

    /// Head of the automatic queue
    Automatic,

    /// Replay of the current track under repeat = file
    RepeatFile,

    /// Popped from history by "previous"
    History,
}

impl Origin {
    /// Queue this origin consumes from, if any
    pub fn queue(self) -> Option<QueueKind> {
        match self {
            Self::Manual => Some(QueueKind::Manual),
            Self::Automatic | Self::RepeatFile => Some(QueueKind::Automatic),
            Self::View | Self::History => None,
        }
    }
}

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Maximum length of the automatic queue
    pub automatic_queue_cap: usize,

    /// "Previous" restarts the current track once this much of it has played
    pub previous_restart_threshold_ms: u64,
}

impl PlaybackConfig {
    pub fn previous_restart_threshold(&self) -> Duration {
        Duration::from_millis(self.previous_restart_threshold_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            automatic_queue_cap: 43,
            previous_restart_threshold_ms: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_cycles_off_set_file() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::Set);
        assert_eq!(RepeatMode::Set.cycle(), RepeatMode::File);
        assert_eq!(RepeatMode::File.cycle(), RepeatMode::Off);
    }

    #[test]
    fn repeat_parses_aliases() {
        assert_eq!("SET".parse::<RepeatMode>(), Ok(RepeatMode::Set));
        assert_eq!("one".parse::<RepeatMode>(), Ok(RepeatMode::File));
        assert!("sometimes".parse::<RepeatMode>().is_err());
        assert_eq!(RepeatMode::File.to_string(), "file");
    }

    #[test]
    fn origin_maps_to_consumed_queue() {
        assert_eq!(Origin::Manual.queue(), Some(QueueKind::Manual));
        assert_eq!(Origin::RepeatFile.queue(), Some(QueueKind::Automatic));
        assert_eq!(Origin::History.queue(), None);
    }

    #[test]
    fn playback_config_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.automatic_queue_cap, 43);
        assert_eq!(config.previous_restart_threshold(), Duration::from_secs(3));
    }
}
