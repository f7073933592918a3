//! Decoder configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Decoder gateway and sample cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Transcoder executable
    pub ffmpeg_path: PathBuf,

    /// Size of each streamed PCM chunk in bytes
    pub stream_chunk_bytes: usize,

    /// Frames de-interleaved between cooperative yields
    pub deinterleave_chunk_frames: usize,

    /// Extensions routed to the chiptune renderer instead of the transcoder
    pub chiptune_extensions: Vec<String>,

    /// Render length for chiptune files that carry no length tag
    pub chiptune_default_secs: u32,

    /// Seconds an unreferenced cache entry is kept
    pub cache_retention_secs: u64,
}

impl DecoderConfig {
    /// Retention window as a duration
    pub fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache_retention_secs)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            stream_chunk_bytes: cadence_core::transfer::DEFAULT_CHUNK_SIZE,
            deinterleave_chunk_frames: 100_000,
            chiptune_extensions: vec!["spc".to_string()],
            chiptune_default_secs: 180,
            cache_retention_secs: 60 * 60,
        }
    }
}
