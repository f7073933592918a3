//! Chiptune rendering
//!
//! Some formats (SNES SPC dumps) are not audio streams but memory images of a
//! sound chip. They are rendered in-process from the raw file bytes rather
//! than passed to the external transcoder.

use crate::error::Result;

/// In-process renderer for chip-music formats
///
/// Implementations emulate the sound hardware and return the whole track as
/// interleaved little-endian `f32` stereo at 48 kHz. Rendering is CPU bound;
/// the gateway runs it on a blocking worker.
pub trait ChiptuneRenderer: Send + Sync {
    /// Render `file` (the complete file contents) to interleaved PCM bytes
    fn render(&self, file: &[u8]) -> Result<Vec<u8>>;
}
