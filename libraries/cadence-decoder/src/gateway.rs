//! Decoder gateway
//!
//! Single entry point for turning a track into a [`DecodedBuffer`]:
//!
//! ```text
//! decode(track)
//!   ├─ cached buffer?            → return it
//!   ├─ decode already in flight? → wait for that result
//!   └─ otherwise lead the decode:
//!        chiptune extension → read file → renderer (blocking worker)
//!        anything else      → transcoder → chunked PCM stream
//!        → de-interleave (yielding) → cache → wake waiters
//! ```

use crate::cache::SampleCache;
use crate::chiptune::ChiptuneRenderer;
use crate::config::DecoderConfig;
use crate::error::{DecodeError, Result};
use crate::pcm;
use crate::transcoder::{FfmpegTranscoder, Transcoder};
use cadence_core::{chunk_channel, DecodedBuffer, MetadataLookup, TrackRef};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Messages buffered between the transcoder and the reassembler
const STREAM_CHANNEL_CAPACITY: usize = 8;

type DecodeOutcome = Result<Arc<DecodedBuffer>>;
type OutcomeReceiver = watch::Receiver<Option<DecodeOutcome>>;

struct GatewayInner {
    config: DecoderConfig,
    cache: SampleCache,
    transcoder: Arc<dyn Transcoder>,
    chiptune: Option<Arc<dyn ChiptuneRenderer>>,
    metadata: Option<Arc<dyn MetadataLookup>>,
    in_flight: Mutex<HashMap<TrackRef, OutcomeReceiver>>,
}

/// Decodes tracks, sharing one decode per track between concurrent callers
///
/// Cheap to clone; clones share the cache and the in-flight table.
#[derive(Clone)]
pub struct DecoderGateway {
    inner: Arc<GatewayInner>,
}

/// Builder for [`DecoderGateway`]
pub struct GatewayBuilder {
    config: DecoderConfig,
    cache: SampleCache,
    transcoder: Option<Arc<dyn Transcoder>>,
    chiptune: Option<Arc<dyn ChiptuneRenderer>>,
    metadata: Option<Arc<dyn MetadataLookup>>,
}

impl GatewayBuilder {
    /// Use a specific transcoder (defaults to FFmpeg at `config.ffmpeg_path`)
    pub fn transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Register the renderer for chiptune extensions
    pub fn chiptune_renderer(mut self, renderer: Arc<dyn ChiptuneRenderer>) -> Self {
        self.chiptune = Some(renderer);
        self
    }

    /// Look up tags for every decoded track and store them in the cache
    pub fn metadata_lookup(mut self, lookup: Arc<dyn MetadataLookup>) -> Self {
        self.metadata = Some(lookup);
        self
    }

    pub fn build(self) -> DecoderGateway {
        let transcoder: Arc<dyn Transcoder> = match self.transcoder {
            Some(transcoder) => transcoder,
            None => Arc::new(FfmpegTranscoder::new(self.config.ffmpeg_path.clone())),
        };
        DecoderGateway {
            inner: Arc::new(GatewayInner {
                config: self.config,
                cache: self.cache,
                transcoder,
                chiptune: self.chiptune,
                metadata: self.metadata,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }
}

enum Role {
    Leader(watch::Sender<Option<DecodeOutcome>>),
    Follower(OutcomeReceiver),
    Cached(Arc<DecodedBuffer>),
}

/// Removes the in-flight slot when the leading decode finishes or is dropped
struct InFlightSlot {
    inner: Arc<GatewayInner>,
    track: TrackRef,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.track);
    }
}

impl DecoderGateway {
    pub fn builder(config: DecoderConfig, cache: SampleCache) -> GatewayBuilder {
        GatewayBuilder {
            config,
            cache,
            transcoder: None,
            chiptune: None,
            metadata: None,
        }
    }

    /// Shared sample cache
    pub fn cache(&self) -> &SampleCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.inner.config
    }

    /// Whether a decode for `track` is currently running
    pub fn is_in_flight(&self, track: &TrackRef) -> bool {
        self.inner.in_flight.lock().contains_key(track)
    }

    /// Decode `track`, or return its cached buffer
    ///
    /// A second call for a track whose decode is already running waits for
    /// that decode instead of starting another. Failed decodes leave nothing
    /// in the cache.
    pub async fn decode(&self, track: &TrackRef) -> Result<Arc<DecodedBuffer>> {
        loop {
            match self.claim(track) {
                Role::Cached(buffer) => return Ok(buffer),
                Role::Leader(sender) => return self.lead(track, sender).await,
                Role::Follower(mut receiver) => {
                    tracing::debug!(track = %track, "waiting on in-flight decode");
                    match receiver.wait_for(Option::is_some).await {
                        Ok(outcome) => {
                            if let Some(outcome) = outcome.as_ref() {
                                return outcome.clone();
                            }
                        }
                        // Leader dropped without a result; claim again
                        Err(_) => continue,
                    }
                }
            }
        }
    }

    fn claim(&self, track: &TrackRef) -> Role {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(receiver) = in_flight.get(track) {
            return Role::Follower(receiver.clone());
        }
        // Completed decodes are cached before their slot is released
        if let Some(buffer) = self.inner.cache.buffer(track) {
            return Role::Cached(buffer);
        }
        let (sender, receiver) = watch::channel(None);
        in_flight.insert(track.clone(), receiver);
        self.inner.cache.touch(track);
        Role::Leader(sender)
    }

    async fn lead(
        &self,
        track: &TrackRef,
        sender: watch::Sender<Option<DecodeOutcome>>,
    ) -> DecodeOutcome {
        let slot = InFlightSlot {
            inner: Arc::clone(&self.inner),
            track: track.clone(),
        };

        tracing::debug!(track = %track, "decode started");
        let outcome = self.run_decode(track).await.map(Arc::new);

        match &outcome {
            Ok(buffer) => {
                self.inner.cache.put(track.clone(), Arc::clone(buffer));
                tracing::info!(
                    track = %track,
                    seconds = buffer.duration_secs(),
                    "decode complete"
                );
                self.spawn_metadata_lookup(track);
            }
            Err(err) => {
                self.inner.cache.discard_pending(track);
                tracing::warn!(track = %track, error = %err, "decode failed");
            }
        }

        drop(slot);
        sender.send_replace(Some(outcome.clone()));
        outcome
    }

    async fn run_decode(&self, track: &TrackRef) -> Result<DecodedBuffer> {
        match tokio::fs::metadata(track.path()).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(DecodeError::MissingFile(track.path().to_path_buf())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DecodeError::MissingFile(track.path().to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        }

        let bytes = if track.has_extension(&self.inner.config.chiptune_extensions) {
            self.render_chiptune(track).await?
        } else {
            self.transcode(track).await?
        };

        pcm::deinterleave(&bytes, self.inner.config.deinterleave_chunk_frames).await
    }

    async fn transcode(&self, track: &TrackRef) -> Result<Vec<u8>> {
        let (sink, receiver) =
            chunk_channel(STREAM_CHANNEL_CAPACITY, self.inner.config.stream_chunk_bytes);

        let (produced, collected) = tokio::join!(
            self.inner.transcoder.transcode(track, sink),
            receiver.collect()
        );
        produced?;
        let transferred = collected?;

        if &transferred.track != track {
            return Err(DecodeError::Malformed(format!(
                "completion for {} while decoding {}",
                transferred.track, track
            )));
        }
        tracing::trace!(track = %track, chunks = transferred.chunks, "PCM stream reassembled");
        Ok(transferred.bytes)
    }

    async fn render_chiptune(&self, track: &TrackRef) -> Result<Vec<u8>> {
        let renderer = self.inner.chiptune.clone().ok_or_else(|| {
            DecodeError::Unsupported(format!("no chiptune renderer registered for {}", track))
        })?;
        let file = tokio::fs::read(track.path()).await?;

        tokio::task::spawn_blocking(move || renderer.render(&file))
            .await
            .map_err(|e| DecodeError::Renderer(e.to_string()))?
    }

    fn spawn_metadata_lookup(&self, track: &TrackRef) {
        let Some(lookup) = self.inner.metadata.clone() else {
            return;
        };
        if self.inner.cache.metadata(track).is_some() {
            return;
        }

        let cache = self.inner.cache.clone();
        let track = track.clone();
        tokio::spawn(async move {
            let lookup_track = track.clone();
            match tokio::task::spawn_blocking(move || lookup.lookup(&lookup_track)).await {
                Ok(metadata) => cache.set_metadata(&track, metadata),
                Err(err) => tracing::warn!(track = %track, error = %err, "metadata lookup panicked"),
            }
        });
    }
}

impl std::fmt::Debug for DecoderGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderGateway")
            .field("config", &self.inner.config)
            .field("in_flight", &self.inner.in_flight.lock().len())
            .finish_non_exhaustive()
    }
}
