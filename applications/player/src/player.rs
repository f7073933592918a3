//! Wiring of the playback stack for the command line

use crate::commands::{self, Input};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::settings::{stored_speed, stored_volume, JsonFileSettings};
use crate::ui;
use cadence_core::{duration_to_frames, MetadataLookup, SettingsStore, TrackRef};
use cadence_decoder::{DecoderGateway, FfmpegTranscoder, SampleCache, SpcRenderer};
use cadence_metadata::{ImportBatch, ImportProgress, LibraryImporter, LoftyMetadataLookup};
use cadence_output::CpalOutput;
use cadence_playback::{
    AudioOutput, OfflineOutput, OutputEvent, RepeatMode, Transport, TransportCommand,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Interval at which the headless output clock is advanced
const OFFLINE_TICK: Duration = Duration::from_millis(10);

/// Options of the `play` command
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub paths: Vec<PathBuf>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

/// Import `paths`, logging progress as chunks complete
pub async fn scan(config: &PlayerConfig, paths: &[PathBuf]) -> Result<ImportBatch> {
    let lookup: Arc<dyn MetadataLookup> = Arc::new(LoftyMetadataLookup::new());
    let importer = LibraryImporter::new(config.library.clone(), lookup);

    let (progress_tx, mut progress_rx) = mpsc::channel(64);
    let reporter = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            if let ImportProgress::ChunkCompleted {
                files_done,
                total_files,
                ..
            } = progress
            {
                tracing::info!("Imported {}/{} files", files_done, total_files);
            }
        }
    });

    let batch = importer.import(paths, Some(progress_tx)).await;
    let _ = reporter.await;
    Ok(batch?)
}

/// Play `options.paths` until the user quits
pub async fn play(config: PlayerConfig, options: PlayOptions) -> Result<()> {
    let settings: Arc<dyn SettingsStore> = Arc::new(JsonFileSettings::open(&config.settings_path)?);
    let volume = stored_volume(settings.as_ref()).unwrap_or(config.output.volume);
    let speed = stored_speed(settings.as_ref()).unwrap_or(1.0);

    let batch = scan(&config, &options.paths).await?;
    let view: Vec<TrackRef> = batch.tracks.into_iter().map(|imported| imported.track).collect();
    if view.is_empty() {
        return Err(PlayerError::Config("no playable files found".to_string()));
    }
    tracing::info!(tracks = view.len(), "Library loaded");

    let lookup: Arc<dyn MetadataLookup> = Arc::new(LoftyMetadataLookup::new());
    let cache = SampleCache::new(config.decoder.cache_retention());
    let gateway = DecoderGateway::builder(config.decoder.clone(), cache)
        .transcoder(Arc::new(FfmpegTranscoder::new(&config.decoder.ffmpeg_path)))
        .chiptune_renderer(Arc::new(SpcRenderer::new(config.decoder.chiptune_default_secs)))
        .metadata_lookup(lookup)
        .build();

    let session = Session {
        config,
        gateway,
        view,
        options,
        volume,
        speed,
        settings,
    };

    match CpalOutput::new(&session.config.output) {
        Ok((output, events)) => {
            tracing::info!("Using audio device output");
            session.drive(output, events).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "No audio device, falling back to headless output");
            let (output, events) = OfflineOutput::new();
            let clock = tokio::spawn(run_offline_clock(output.clone()));
            let result = session.drive(output, events).await;
            clock.abort();
            result
        }
    }
}

/// Advance a headless output in real time
async fn run_offline_clock(output: OfflineOutput) {
    let started = Instant::now();
    let mut advanced = 0u64;
    let mut interval = tokio::time::interval(OFFLINE_TICK);
    loop {
        interval.tick().await;
        let target = duration_to_frames(started.elapsed());
        output.advance(target - advanced);
        advanced = target;
    }
}

struct Session {
    config: PlayerConfig,
    gateway: DecoderGateway,
    view: Vec<TrackRef>,
    options: PlayOptions,
    volume: f32,
    speed: f32,
    settings: Arc<dyn SettingsStore>,
}

impl Session {
    async fn drive<O: AudioOutput>(
        self,
        output: O,
        output_events: mpsc::UnboundedReceiver<OutputEvent>,
    ) -> Result<()> {
        let mut transport = Transport::new(self.config.playback.clone(), self.gateway, output);
        let renderer = tokio::spawn(ui::render_events(transport.subscribe(), self.settings));

        let first = self.view[0].clone();
        transport.set_volume(self.volume);
        transport.set_speed(self.speed)?;
        transport.set_view(self.view);

        let (commands_tx, commands_rx) = mpsc::channel(32);
        let opening = if self.options.shuffle {
            transport.toggle_shuffle();
            TransportCommand::PlayPause
        } else {
            TransportCommand::PlayTrack(first)
        };
        for command in [opening, TransportCommand::SetRepeat(self.options.repeat)] {
            commands_tx
                .send(command)
                .await
                .map_err(|e| PlayerError::Config(e.to_string()))?;
        }
        spawn_stdin_reader(commands_tx)?;
        println!("{}", commands::HELP);

        tokio::select! {
            () = transport.run(commands_rx, output_events) => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
        }

        let _ = renderer.await;
        Ok(())
    }
}

/// Forward stdin commands until `q` or end of input
///
/// Runs on its own thread so a pending read never holds up shutdown.
fn spawn_stdin_reader(commands: mpsc::Sender<TransportCommand>) -> Result<()> {
    std::thread::Builder::new()
        .name("cadence-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match commands::parse(&line) {
                    Some(Input::Quit) => break,
                    Some(Input::Transport(command)) => {
                        if commands.blocking_send(command).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("{}", commands::HELP),
                }
            }
        })?;
    Ok(())
}
