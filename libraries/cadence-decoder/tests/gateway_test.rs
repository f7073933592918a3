//! Decoder gateway integration tests

use async_trait::async_trait;
use cadence_core::{
    ChunkSender, CoreError, DecodedBuffer, MetadataLookup, TrackMetadata, TrackRef, SAMPLE_RATE,
};
use cadence_decoder::pcm::interleave;
use cadence_decoder::{
    ChiptuneRenderer, DecodeError, DecoderConfig, DecoderGateway, SampleCache, SpcRenderer,
    Transcoder,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ===== Helpers =====

/// Emits a ramp of `frames` frames after an optional delay, counting invocations
struct CountingTranscoder {
    calls: AtomicUsize,
    frames: usize,
    delay: Duration,
}

impl CountingTranscoder {
    fn new(frames: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            frames,
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for CountingTranscoder {
    async fn transcode(
        &self,
        track: &TrackRef,
        sink: ChunkSender,
    ) -> cadence_decoder::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let left: Vec<f32> = (0..self.frames).map(|i| i as f32 / 1000.0).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        sink.send_all(&interleave(&left, &right)).await?;
        sink.complete(track.clone()).await?;
        Ok(())
    }
}

/// Sends one chunk, then fails like a process with a non-zero exit
struct FailingTranscoder {
    calls: AtomicUsize,
}

#[async_trait]
impl Transcoder for FailingTranscoder {
    async fn transcode(&self, _track: &TrackRef, sink: ChunkSender) -> cadence_decoder::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sink.send_chunk(vec![0; 64]).await?;
        Err(DecodeError::ProcessFailed {
            status: "exit status: 1".to_string(),
            stderr: "Invalid data found when processing input".to_string(),
        })
    }
}

/// Renders a fixed number of seconds of a square wave
struct SquareRenderer {
    seconds: usize,
}

impl ChiptuneRenderer for SquareRenderer {
    fn render(&self, file: &[u8]) -> cadence_decoder::Result<Vec<u8>> {
        if file.is_empty() {
            return Err(DecodeError::Renderer("empty dump".to_string()));
        }
        let frames = self.seconds * SAMPLE_RATE as usize;
        let wave: Vec<f32> = (0..frames)
            .map(|i| if (i / 64) % 2 == 0 { 0.25 } else { -0.25 })
            .collect();
        Ok(interleave(&wave, &wave))
    }
}

struct TitleLookup;

impl MetadataLookup for TitleLookup {
    fn lookup(&self, track: &TrackRef) -> TrackMetadata {
        TrackMetadata {
            title: Some(track.file_name()),
            ..Default::default()
        }
    }

    fn pictures(&self, _track: &TrackRef, _sink: ChunkSender) -> Result<(), CoreError> {
        Ok(())
    }
}

fn audio_file(dir: &TempDir, name: &str) -> TrackRef {
    let path = dir.path().join(name);
    std::fs::write(&path, b"not really audio").unwrap();
    TrackRef::new(path)
}

fn gateway_with(transcoder: Arc<dyn Transcoder>) -> DecoderGateway {
    DecoderGateway::builder(DecoderConfig::default(), SampleCache::default())
        .transcoder(transcoder)
        .build()
}

// ===== Concurrency guard =====

#[tokio::test]
async fn concurrent_requests_share_one_decode() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "a.flac");
    let transcoder = CountingTranscoder::new(4_800, Duration::from_millis(50));
    let gateway = gateway_with(transcoder.clone());

    let (first, second) = tokio::join!(gateway.decode(&track), gateway.decode(&track));
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(transcoder.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.frames(), 4_800);
    assert!(!gateway.is_in_flight(&track));
}

#[tokio::test]
async fn spawned_requests_share_one_decode() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "b.mp3");
    let transcoder = CountingTranscoder::new(480, Duration::from_millis(100));
    let gateway = gateway_with(transcoder.clone());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let gateway = gateway.clone();
            let track = track.clone();
            tokio::spawn(async move { gateway.decode(&track).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().frames(), 480);
    }
    assert_eq!(transcoder.calls(), 1);
}

#[tokio::test]
async fn cached_buffer_skips_transcoder() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "c.ogg");
    let transcoder = CountingTranscoder::new(100, Duration::ZERO);
    let gateway = gateway_with(transcoder.clone());

    gateway.decode(&track).await.unwrap();
    gateway.decode(&track).await.unwrap();

    assert_eq!(transcoder.calls(), 1);
    assert!(gateway.cache().buffer(&track).is_some());
}

#[tokio::test]
async fn decoded_channels_are_planar() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "d.wav");
    let gateway = gateway_with(CountingTranscoder::new(3, Duration::ZERO));

    let buffer = gateway.decode(&track).await.unwrap();

    assert_eq!(buffer.channel(0), &[0.0, 0.001, 0.002]);
    assert_eq!(buffer.channel(1), &[-0.0, -0.001, -0.002]);
}

// ===== Failures =====

#[tokio::test]
async fn process_failure_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "broken.flac");
    let transcoder = Arc::new(FailingTranscoder {
        calls: AtomicUsize::new(0),
    });
    let gateway = gateway_with(transcoder.clone());

    let err = gateway.decode(&track).await.unwrap_err();
    assert!(matches!(err, DecodeError::ProcessFailed { .. }));
    assert!(!err.is_missing_file());
    assert!(!gateway.cache().contains(&track));
    assert!(!gateway.is_in_flight(&track));

    // Terminal for that attempt only; a retry decodes again
    let _ = gateway.decode(&track).await;
    assert_eq!(transcoder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_file_is_distinguishable() {
    let transcoder = CountingTranscoder::new(10, Duration::ZERO);
    let gateway = gateway_with(transcoder.clone());
    let track = TrackRef::new("/definitely/not/here.flac");

    let err = gateway.decode(&track).await.unwrap_err();

    assert!(err.is_missing_file());
    assert_eq!(transcoder.calls(), 0);
    assert!(gateway.cache().is_empty());
}

#[tokio::test]
async fn waiters_see_the_same_failure() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "broken.mp3");
    let gateway = gateway_with(Arc::new(FailingTranscoder {
        calls: AtomicUsize::new(0),
    }));

    let (first, second) = tokio::join!(gateway.decode(&track), gateway.decode(&track));
    assert_eq!(first.unwrap_err(), second.unwrap_err());
}

// ===== Chiptune path =====

#[tokio::test]
async fn thirty_second_chiptune_renders_in_process() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "Corridors of Time.spc");
    let transcoder = CountingTranscoder::new(10, Duration::ZERO);
    let gateway = DecoderGateway::builder(DecoderConfig::default(), SampleCache::default())
        .transcoder(transcoder.clone())
        .chiptune_renderer(Arc::new(SquareRenderer { seconds: 30 }))
        .build();

    let buffer = gateway.decode(&track).await.unwrap();

    assert!((buffer.duration_secs() - 30.0).abs() < 1e-9);
    assert_eq!(buffer.sample_rate(), 48_000);
    assert_eq!(buffer.channel_count(), 2);
    assert_eq!(buffer.frames(), 30 * 48_000);
    assert_eq!(transcoder.calls(), 0);
}

#[tokio::test]
async fn spc_dump_renders_for_its_tagged_length() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Silent Corridor.spc");
    let mut dump = vec![0u8; 0x10200];
    dump[..27].copy_from_slice(b"SNES-SPC700 Sound File Data");
    dump[0x21] = 26;
    dump[0x22] = 26;
    dump[0x23] = 26;
    dump[0x24] = 30;
    dump[0xA9..0xAB].copy_from_slice(b"30");
    std::fs::write(&path, &dump).unwrap();
    let track = TrackRef::new(path.clone());

    let gateway = DecoderGateway::builder(DecoderConfig::default(), SampleCache::default())
        .transcoder(CountingTranscoder::new(10, Duration::ZERO))
        .chiptune_renderer(Arc::new(SpcRenderer::default()))
        .build();

    let buffer = gateway.decode(&track).await.unwrap();

    assert!((buffer.duration_secs() - 30.0).abs() < 1e-9);
    assert_eq!(buffer.channel_count(), 2);
}

#[tokio::test]
async fn chiptune_without_renderer_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "song.SPC");
    let gateway = gateway_with(CountingTranscoder::new(10, Duration::ZERO));

    let err = gateway.decode(&track).await.unwrap_err();
    assert!(matches!(err, DecodeError::Unsupported(_)));
}

// ===== Metadata =====

#[tokio::test]
async fn metadata_is_attached_after_decode() {
    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "tagged.flac");
    let gateway = DecoderGateway::builder(DecoderConfig::default(), SampleCache::default())
        .transcoder(CountingTranscoder::new(10, Duration::ZERO))
        .metadata_lookup(Arc::new(TitleLookup))
        .build();

    gateway.decode(&track).await.unwrap();

    let mut metadata = None;
    for _ in 0..100 {
        metadata = gateway.cache().metadata(&track);
        if metadata.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(metadata.unwrap().title.as_deref(), Some("tagged.flac"));
}

// ===== External process =====

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "{}", body).unwrap();
        file.sync_all().unwrap();
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn external_process_exit_status_decides_outcome() {
    use cadence_decoder::FfmpegTranscoder;

    let dir = TempDir::new().unwrap();
    let track = audio_file(&dir, "input.flac");

    // 4 frames of zeros on stdout
    let ok = write_script(dir.path(), "ok-ffmpeg", "head -c 32 /dev/zero");
    let gateway = gateway_with(Arc::new(FfmpegTranscoder::new(ok)));
    let buffer: Arc<DecodedBuffer> = gateway.decode(&track).await.unwrap();
    assert_eq!(buffer.frames(), 4);

    let bad = write_script(
        dir.path(),
        "bad-ffmpeg",
        "echo 'moov atom not found' >&2; exit 1",
    );
    let gateway = gateway_with(Arc::new(FfmpegTranscoder::new(bad)));
    match gateway.decode(&track).await {
        Err(DecodeError::ProcessFailed { stderr, .. }) => {
            assert!(stderr.contains("moov atom not found"));
        }
        other => panic!("expected process failure, got {:?}", other),
    }
    assert!(!gateway.cache().contains(&track));
}
