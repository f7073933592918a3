//! Output configuration

use serde::{Deserialize, Serialize};

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Frames between "now" and the earliest start of a new source
    ///
    /// Should cover at least one device buffer so a freshly started source
    /// is not already late when the callback first sees it.
    pub start_latency_frames: u64,

    /// Initial linear gain
    pub volume: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            start_latency_frames: 2048,
            volume: 1.0,
        }
    }
}
