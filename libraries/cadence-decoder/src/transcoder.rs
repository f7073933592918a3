//! External transcoding process

use crate::error::{DecodeError, Result};
use async_trait::async_trait;
use cadence_core::{ChunkSender, TrackRef, CHANNELS, SAMPLE_RATE};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Streams a track as raw PCM
///
/// Output is interleaved little-endian `f32`, 2 channels, 48 kHz, delivered
/// through `sink` in chunks and terminated by a completion signal. On error
/// the sink is dropped without completion, so the receiver never mistakes a
/// partial stream for a whole one.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Decode `track` into `sink`
    async fn transcode(&self, track: &TrackRef, sink: ChunkSender) -> Result<()>;
}

/// FFmpeg wrapper writing `f32le` to its stdout
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn command(&self, track: &TrackRef) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-nostdin")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(track.path())
            .arg("-f")
            .arg("f32le")
            .arg("-acodec")
            .arg("pcm_f32le")
            .arg("-ar")
            .arg(SAMPLE_RATE.to_string())
            .arg("-ac")
            .arg(CHANNELS.to_string())
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, track: &TrackRef, sink: ChunkSender) -> Result<()> {
        let mut child = self
            .command(track)
            .spawn()
            .map_err(|e| DecodeError::Spawn(format!("{}: {}", self.ffmpeg_path.display(), e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| DecodeError::Spawn("stdout was not captured".to_string()))?;

        // Drained concurrently so a chatty decoder cannot block on a full pipe
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut text).await;
            }
            text
        });

        let chunk_size = sink.chunk_size();
        let mut pending: Vec<u8> = Vec::with_capacity(chunk_size);
        let mut read_buf = vec![0u8; 64 * 1024];
        let mut total = 0usize;
        let mut chunks = 0usize;

        loop {
            let n = stdout.read(&mut read_buf).await?;
            if n == 0 {
                break;
            }
            total += n;
            pending.extend_from_slice(&read_buf[..n]);

            while pending.len() >= chunk_size {
                let rest = pending.split_off(chunk_size);
                let chunk = std::mem::replace(&mut pending, rest);
                sink.send_chunk(chunk).await?;
                chunks += 1;
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            tracing::warn!(track = %track, %status, "decode process failed");
            return Err(DecodeError::ProcessFailed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        if !pending.is_empty() {
            sink.send_chunk(pending).await?;
            chunks += 1;
        }
        tracing::debug!(track = %track, bytes = total, chunks, "decode process finished");

        sink.complete(track.clone()).await?;
        Ok(())
    }
}
