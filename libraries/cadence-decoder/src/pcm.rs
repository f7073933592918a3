//! Raw PCM framing
//!
//! Decoders hand over interleaved little-endian `f32` stereo at 48 kHz. The
//! bytes are split into planar channels in bounded chunks, yielding to the
//! executor between chunks so a long track does not starve other tasks.

use crate::error::{DecodeError, Result};
use cadence_core::{DecodedBuffer, CHANNELS};

/// Bytes per sample (`f32`)
pub const BYTES_PER_SAMPLE: usize = 4;

/// Bytes per interleaved stereo frame
pub const BYTES_PER_FRAME: usize = BYTES_PER_SAMPLE * CHANNELS;

/// Split interleaved `f32le` stereo bytes into a planar buffer
///
/// Yields after every `chunk_frames` frames.
///
/// # Errors
/// Returns `Malformed` if `bytes` does not hold a whole number of frames
pub async fn deinterleave(bytes: &[u8], chunk_frames: usize) -> Result<DecodedBuffer> {
    if bytes.len() % BYTES_PER_FRAME != 0 {
        return Err(DecodeError::Malformed(format!(
            "{} bytes is not a whole number of {}-byte frames",
            bytes.len(),
            BYTES_PER_FRAME
        )));
    }

    let frames = bytes.len() / BYTES_PER_FRAME;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);

    for (index, chunk) in bytes
        .chunks(chunk_frames.max(1) * BYTES_PER_FRAME)
        .enumerate()
    {
        if index > 0 {
            tokio::task::yield_now().await;
        }
        for frame in chunk.chunks_exact(BYTES_PER_FRAME) {
            left.push(f32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]));
            right.push(f32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]));
        }
    }

    Ok(DecodedBuffer::from_planar(left, right)?)
}

/// Interleave planar samples back into `f32le` bytes
///
/// Used by renderers and test fixtures that synthesise PCM.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(left.len().min(right.len()) * BYTES_PER_FRAME);
    for (l, r) in left.iter().zip(right) {
        bytes.extend_from_slice(&l.to_le_bytes());
        bytes.extend_from_slice(&r.to_le_bytes());
    }
    bytes
}
