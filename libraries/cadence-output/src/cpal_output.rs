/// CPAL-based audio output (sample-clocked, audio thread owns the stream)
use crate::config::OutputConfig;
use crate::error::{OutputError, Result};
use crate::mixer::{Mixer, MixerCommand};
use cadence_core::{CHANNELS, SAMPLE_RATE};
use cadence_playback::{AudioOutput, ClockTime, OutputEvent, SourceId, SourceRequest};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Commands queued for the audio callback
const MIXER_QUEUE: usize = 256;

/// Source-ended events queued by the audio callback
const EVENT_QUEUE: usize = 256;

/// CPAL audio output
///
/// Implements [`AudioOutput`] on the default output device at 48 kHz.
///
/// **Architecture**: a dedicated audio thread owns the CPAL `Stream`, which
/// is not `Send` on every platform. The stream callback owns the [`Mixer`]
/// and drains start/stop commands from a lock-free channel before each
/// block; the clock it advances is shared through an atomic. Ended sources
/// leave the callback over a bounded channel and a forwarding thread hands
/// them to the transport.
pub struct CpalOutput {
    /// Commands for the audio callback
    commands: Sender<MixerCommand>,
    /// Tells the audio thread to drop the stream
    shutdown: Sender<()>,
    /// Frames rendered so far
    clock: Arc<AtomicU64>,
    next_id: u64,
    start_latency: u64,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the default output device
    ///
    /// Returns the output and the receiver for its source-ended events.
    ///
    /// # Errors
    /// Returns an error if no device is found, the device cannot play 48 kHz
    /// float samples, or the stream fails to start.
    pub fn new(config: &OutputConfig) -> Result<(Self, mpsc::UnboundedReceiver<OutputEvent>)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(OutputError::DeviceNotFound)?;
        Self::with_device(device, config)
    }

    /// Open a specific device
    pub fn with_device(
        device: Device,
        config: &OutputConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<OutputEvent>)> {
        let stream_config = Self::stream_config(&device)?;
        let clock = Arc::new(AtomicU64::new(0));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ended_tx, ended_rx) = bounded::<OutputEvent>(EVENT_QUEUE);
        let (command_tx, command_rx) = bounded::<MixerCommand>(MIXER_QUEUE);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let mut mixer = Mixer::new(Arc::clone(&clock), ended_tx);
        mixer.apply(MixerCommand::SetVolume(config.volume));

        // Ends when the mixer, and with it the sender, is dropped
        thread::Builder::new()
            .name("cadence-output-events".to_string())
            .spawn(move || {
                for event in ended_rx {
                    if events_tx.send(event).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| OutputError::DeviceError(e.to_string()))?;

        let audio_thread = thread::Builder::new()
            .name("cadence-audio".to_string())
            .spawn(move || {
                Self::audio_thread_run(
                    device,
                    stream_config,
                    mixer,
                    command_rx,
                    shutdown_rx,
                    ready_tx,
                );
            })
            .map_err(|e| OutputError::DeviceError(e.to_string()))?;

        ready_rx.recv().map_err(|_| OutputError::ThreadStopped)??;
        info!(
            sample_rate = SAMPLE_RATE,
            start_latency = config.start_latency_frames,
            "Audio output started"
        );

        Ok((
            Self {
                commands: command_tx,
                shutdown: shutdown_tx,
                clock,
                next_id: 1,
                start_latency: config.start_latency_frames,
                audio_thread: Some(audio_thread),
            },
            events_rx,
        ))
    }

    /// Pick a 48 kHz float configuration, preferring stereo
    fn stream_config(device: &Device) -> Result<StreamConfig> {
        let range = device
            .supported_output_configs()?
            .filter(|range| range.sample_format() == SampleFormat::F32)
            .filter(|range| {
                range.min_sample_rate() <= SAMPLE_RATE && range.max_sample_rate() >= SAMPLE_RATE
            })
            .min_by_key(|range| (i32::from(range.channels()) - CHANNELS as i32).abs())
            .ok_or_else(|| {
                OutputError::UnsupportedFormat(format!(
                    "no f32 output configuration at {} Hz",
                    SAMPLE_RATE
                ))
            })?;

        Ok(StreamConfig {
            channels: range.channels(),
            sample_rate: SAMPLE_RATE,
            buffer_size: BufferSize::Default,
        })
    }

    /// Audio thread main loop
    ///
    /// Builds and plays the stream, reports readiness, then keeps the stream
    /// alive until shutdown.
    fn audio_thread_run(
        device: Device,
        config: StreamConfig,
        mut mixer: Mixer,
        commands: Receiver<MixerCommand>,
        shutdown: Receiver<()>,
        ready: Sender<Result<()>>,
    ) {
        let channels = usize::from(config.channels);
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(command) = commands.try_recv() {
                    mixer.apply(command);
                }
                mixer.render(data, channels);
            },
            |err| error!(error = %err, "Audio stream error"),
            None,
        );

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(e.into()));
                return;
            }
        };
        if let Err(e) = stream.play() {
            let _ = ready.send(Err(e.into()));
            return;
        }
        let _ = ready.send(Ok(()));

        // Either an explicit shutdown or the output being dropped
        let _ = shutdown.recv();
        drop(stream);
    }

    fn send(&self, command: MixerCommand) -> Result<()> {
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => {
                OutputError::PlayError("audio callback is not draining commands".to_string())
            }
            TrySendError::Disconnected(_) => OutputError::ThreadStopped,
        })
    }
}

impl AudioOutput for CpalOutput {
    fn now(&self) -> ClockTime {
        ClockTime::from_frames(self.clock.load(Ordering::Acquire))
    }

    fn start_latency(&self) -> u64 {
        self.start_latency
    }

    fn start(&mut self, request: SourceRequest) -> cadence_playback::Result<SourceId> {
        if request.buffer.is_empty() {
            return Err(OutputError::PlayError("cannot start an empty buffer".to_string()).into());
        }
        let id = SourceId::new(self.next_id);
        self.next_id += 1;
        self.send(MixerCommand::Start { id, request })?;
        Ok(id)
    }

    fn stop(&mut self, id: SourceId) {
        if let Err(e) = self.send(MixerCommand::Stop(id)) {
            warn!(%id, error = %e, "Failed to stop source");
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Err(e) = self.send(MixerCommand::SetVolume(volume)) {
            warn!(error = %e, "Failed to set volume");
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}
