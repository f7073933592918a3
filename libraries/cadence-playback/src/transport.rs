//! Transport controller
//!
//! Reduces user intents (play/pause, seek, next, previous, shuffle, repeat,
//! queue edits) to queue manager queries plus scheduler transitions, and
//! reacts to end-of-source notifications from the output.
//!
//! Everything here runs on one task: intents, output events and finished
//! prefetch decodes are handled one at a time, so a track end can never
//! interleave with a skip. Prefetch decodes run on spawned tasks and report
//! back over a channel; a result for a track that is no longer wanted only
//! lands in the cache.
//!
//! A follower that finishes decoding too late to be armed stays pending and
//! starts from its first frame when the current track ends. A follower that
//! failed to decode is reported once; reaching it at the end of the current
//! track does not decode it again.

use crate::error::{PlaybackError, Result};
use crate::events::PlayerEvent;
use crate::output::{AudioOutput, OutputEvent, MAX_RATE, MIN_RATE};
use crate::queue::QueueManager;
use crate::scheduler::{Scheduler, SourceEnd};
use crate::session::PlaybackSession;
use crate::types::{Origin, PlaybackConfig, QueueKind, RepeatMode, SchedulerState};
use cadence_core::{DecodedBuffer, TrackRef};
use cadence_decoder::{DecodeError, DecoderGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Intents accepted by [`Transport::execute`]
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    /// Toggle between playing and paused, starting something if idle
    PlayPause,
    /// Play a track chosen from the active view
    PlayTrack(TrackRef),
    /// Jump within the current track
    Seek(Duration),
    Next,
    Previous,
    ToggleShuffle,
    /// Off → set → file → off
    CycleRepeat,
    SetRepeat(RepeatMode),
    Stop,
    /// Append to the manual queue
    Enqueue(TrackRef),
    /// Insert at the head of the manual queue
    PlayNext(TrackRef),
    Remove { queue: QueueKind, index: usize },
    ClearQueue(QueueKind),
    /// Replace the active view order
    SetView(Vec<TrackRef>),
    /// Linear gain, clamped to `[0, 1]`
    SetVolume(f32),
    /// Playback rate, clamped to `[0.25, 8]`
    SetSpeed(f32),
}

/// Outcome of a background decode of the next track
struct Prefetched {
    generation: u64,
    track: TrackRef,
    origin: Origin,
    result: std::result::Result<Arc<DecodedBuffer>, DecodeError>,
}

/// Playback orchestration over one session
pub struct Transport<O: AudioOutput> {
    config: PlaybackConfig,
    session: PlaybackSession,
    queues: QueueManager,
    scheduler: Scheduler<O>,
    gateway: DecoderGateway,
    events: broadcast::Sender<PlayerEvent>,

    prefetch_tx: mpsc::UnboundedSender<Prefetched>,
    prefetch_rx: mpsc::UnboundedReceiver<Prefetched>,

    /// Bumped whenever the follower is invalidated; older prefetches are
    /// dropped on arrival
    generation: u64,

    /// Follower being decoded, armed, or waiting for the current end
    pending_next: Option<(TrackRef, Origin)>,

    /// A prefetch for the current generation is outstanding
    prefetching: bool,

    /// Follower whose prefetch failed in the current generation
    failed_next: Option<(TrackRef, DecodeError)>,

    volume: f32,
    speed: f32,
}

impl<O: AudioOutput> Transport<O> {
    pub fn new(config: PlaybackConfig, gateway: DecoderGateway, output: O) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (prefetch_tx, prefetch_rx) = mpsc::unbounded_channel();
        Self {
            queues: QueueManager::new(&config),
            config,
            session: PlaybackSession::new(),
            scheduler: Scheduler::new(output),
            gateway,
            events,
            prefetch_tx,
            prefetch_rx,
            generation: 0,
            pending_next: None,
            prefetching: false,
            failed_next: None,
            volume: 1.0,
            speed: 1.0,
        }
    }

    // ===== Accessors =====

    /// Subscribe to player events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn queues(&self) -> &QueueManager {
        &self.queues
    }

    pub fn scheduler(&self) -> &Scheduler<O> {
        &self.scheduler
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn gateway(&self) -> &DecoderGateway {
        &self.gateway
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Position within the current track
    pub fn elapsed(&self) -> Duration {
        self.scheduler.elapsed(&self.session)
    }

    // ===== Event loop =====

    /// Drive the transport until the command channel closes
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<TransportCommand>,
        mut output_events: mpsc::UnboundedReceiver<OutputEvent>,
    ) {
        info!("Transport started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.execute(command).await {
                            warn!(error = %e, "Transport command failed");
                        }
                    }
                    None => break,
                },
                Some(event) = output_events.recv() => {
                    if let Err(e) = self.handle_output_event(event).await {
                        warn!(error = %e, "Failed to handle output event");
                    }
                }
                Some(prefetched) = self.prefetch_rx.recv() => self.handle_prefetched(prefetched),
            }
        }
        self.stop();
        info!("Transport stopped");
    }

    /// Apply one intent
    pub async fn execute(&mut self, command: TransportCommand) -> Result<()> {
        debug!(?command, "Executing transport command");
        match command {
            TransportCommand::PlayPause => self.play_pause().await,
            TransportCommand::PlayTrack(track) => self.play_track(track).await,
            TransportCommand::Seek(position) => self.seek(position),
            TransportCommand::Next => self.next().await,
            TransportCommand::Previous => self.previous().await,
            TransportCommand::ToggleShuffle => {
                self.toggle_shuffle();
                Ok(())
            }
            TransportCommand::CycleRepeat => {
                self.cycle_repeat();
                Ok(())
            }
            TransportCommand::SetRepeat(mode) => {
                self.set_repeat(mode);
                Ok(())
            }
            TransportCommand::Stop => {
                self.stop();
                Ok(())
            }
            TransportCommand::Enqueue(track) => {
                self.enqueue(track);
                Ok(())
            }
            TransportCommand::PlayNext(track) => {
                self.play_next(track);
                Ok(())
            }
            TransportCommand::Remove { queue, index } => self.remove(queue, index).map(|_| ()),
            TransportCommand::ClearQueue(queue) => {
                self.clear_queue(queue);
                Ok(())
            }
            TransportCommand::SetView(view) => {
                self.set_view(view);
                Ok(())
            }
            TransportCommand::SetVolume(volume) => {
                self.set_volume(volume);
                Ok(())
            }
            TransportCommand::SetSpeed(speed) => self.set_speed(speed),
        }
    }

    // ===== Intents =====

    /// Pause when playing, resume when paused, otherwise start something
    pub async fn play_pause(&mut self) -> Result<()> {
        match self.scheduler.state() {
            SchedulerState::Playing => {
                self.invalidate_next();
                self.scheduler.pause(&mut self.session);
                self.emit_state();
                Ok(())
            }
            SchedulerState::Paused => {
                let position = self.session.paused_at;
                self.play_current(position).await
            }
            SchedulerState::Idle | SchedulerState::SeekingRestart => {
                if self.session.current_track.is_some() {
                    return self.play_current(Duration::ZERO).await;
                }
                let (track, origin) = self
                    .queues
                    .first_playable()
                    .ok_or(PlaybackError::NoTrackLoaded)?;
                self.start(track, origin).await
            }
        }
    }

    /// Play a track picked from the active view
    pub async fn play_track(&mut self, track: TrackRef) -> Result<()> {
        self.start(track, Origin::View).await
    }

    /// Jump to `position` in the current track
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        let before = self.scheduler.state();
        if let Err(e) = self.scheduler.seek(&mut self.session, position) {
            if self.scheduler.state() != before {
                self.invalidate_next();
                self.emit_state();
            }
            return Err(e);
        }
        if before == SchedulerState::Playing {
            // The restart released the follower
            self.invalidate_next();
            self.prepare_next();
        }
        Ok(())
    }

    /// Skip to the resolved next track, or stop when there is none
    pub async fn next(&mut self) -> Result<()> {
        self.invalidate_next();
        match self.queues.resolve_next(&self.session) {
            Some((track, origin)) => self.start(track, origin).await,
            None => {
                self.scheduler.stop(&mut self.session);
                self.finish_session();
                Ok(())
            }
        }
    }

    /// Step back in history early in a track, otherwise restart it
    pub async fn previous(&mut self) -> Result<()> {
        if self.session.current_track.is_none() {
            let track = self
                .queues
                .step_back(&self.session)
                .ok_or(PlaybackError::NoTrackLoaded)?;
            return self.start(track, Origin::History).await;
        }

        let elapsed = self.elapsed();
        if elapsed < self.config.previous_restart_threshold() && !self.queues.history().is_empty()
        {
            if let Some(track) = self.queues.step_back(&self.session) {
                return self.start(track, Origin::History).await;
            }
        }

        match self.scheduler.state() {
            SchedulerState::Playing | SchedulerState::Paused => self.seek(Duration::ZERO),
            SchedulerState::Idle | SchedulerState::SeekingRestart => {
                self.play_current(Duration::ZERO).await
            }
        }
    }

    pub fn toggle_shuffle(&mut self) {
        self.session.shuffle = !self.session.shuffle;
        self.queues.on_shuffle_changed(&self.session);
        self.after_queue_mutation();
        self.emit_modes();
        self.reschedule_next();
    }

    pub fn cycle_repeat(&mut self) {
        self.set_repeat(self.session.repeat.cycle());
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.session.repeat = mode;
        self.queues.on_repeat_changed(&self.session);
        self.after_queue_mutation();
        self.emit_modes();
        self.reschedule_next();
    }

    /// Release every source and reset the session; queues are kept
    pub fn stop(&mut self) {
        self.invalidate_next();
        self.scheduler.stop(&mut self.session);
        self.session.reset();
        self.emit_state();
        self.emit(PlayerEvent::Stopped);
    }

    pub fn enqueue(&mut self, track: TrackRef) {
        self.queues.enqueue(track);
        self.after_queue_mutation();
        self.reschedule_next();
    }

    pub fn play_next(&mut self, track: TrackRef) {
        self.queues.play_next(track);
        self.after_queue_mutation();
        self.reschedule_next();
    }

    pub fn remove(&mut self, queue: QueueKind, index: usize) -> Result<TrackRef> {
        let removed = self
            .queues
            .remove(&self.session, queue, index)
            .ok_or_else(|| {
                PlaybackError::InvalidOperation(format!("no {:?} entry at {}", queue, index))
            })?;
        self.after_queue_mutation();
        self.reschedule_next();
        Ok(removed)
    }

    pub fn clear_queue(&mut self, queue: QueueKind) {
        self.queues.clear(queue);
        self.after_queue_mutation();
        self.reschedule_next();
    }

    pub fn set_view(&mut self, view: Vec<TrackRef>) {
        debug!(tracks = view.len(), "View replaced");
        self.queues.set_view(view);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.scheduler.set_volume(self.volume);
        self.emit(PlayerEvent::VolumeChanged {
            volume: self.volume,
        });
    }

    /// Change the playback rate of the current and every later source
    ///
    /// A sounding track restarts at its current position under the new
    /// rate and its follower is armed again.
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        if !speed.is_finite() {
            return Err(PlaybackError::InvalidOperation(format!(
                "invalid playback speed {}",
                speed
            )));
        }
        let speed = speed.clamp(MIN_RATE, MAX_RATE);
        let changed = speed != self.speed;
        self.speed = speed;
        self.scheduler.set_rate(speed);
        self.emit(PlayerEvent::SpeedChanged { speed });

        if changed && self.scheduler.state() == SchedulerState::Playing {
            let position = self.elapsed();
            return self.seek(position);
        }
        Ok(())
    }

    // ===== Output events =====

    /// React to an end-of-source notification
    pub async fn handle_output_event(&mut self, event: OutputEvent) -> Result<()> {
        let OutputEvent::SourceEnded(id) = event;
        match self.scheduler.on_source_ended(&mut self.session, id) {
            SourceEnd::Stale => Ok(()),
            SourceEnd::Advanced {
                finished,
                track,
                origin,
            } => {
                info!(%track, "Gapless handoff");
                self.pending_next = None;
                self.queues
                    .begin_track(&mut self.session, track.clone(), origin);
                self.after_queue_mutation();
                self.emit(PlayerEvent::TrackChanged {
                    track,
                    previous: Some(finished),
                    gapless: true,
                });
                self.prepare_next();
                Ok(())
            }
            SourceEnd::Finished { track } => {
                self.pending_next = None;
                let failed = self.failed_next.take();
                match self.queues.resolve_next(&self.session) {
                    Some((next, origin)) => {
                        let known_failure = failed.filter(|(failed_track, _)| *failed_track == next);
                        if let Some((_, error)) = known_failure {
                            debug!(finished = %track, next = %next, "Follower already failed to decode");
                            self.begin(next, origin);
                            self.abandon_current();
                            return Err(error.into());
                        }
                        debug!(finished = %track, next = %next, "Follower not armed, starting with a gap");
                        self.start(next, origin).await
                    }
                    None => {
                        info!(%track, "Queues exhausted");
                        self.finish_session();
                        Ok(())
                    }
                }
            }
        }
    }

    /// Handle every output event already waiting on `events`
    pub async fn pump(&mut self, events: &mut mpsc::UnboundedReceiver<OutputEvent>) -> Result<()> {
        while let Ok(event) = events.try_recv() {
            self.handle_output_event(event).await?;
        }
        Ok(())
    }

    /// Wait for the outstanding follower decode, if any, and arm it
    ///
    /// Returns whether a follower is armed afterwards.
    pub async fn await_prefetch(&mut self) -> bool {
        while self.prefetching {
            match self.prefetch_rx.recv().await {
                Some(prefetched) => self.handle_prefetched(prefetched),
                None => break,
            }
        }
        self.scheduler.scheduled().is_some()
    }

    // ===== Internals =====

    /// Make `track` current and start it from the beginning
    async fn start(&mut self, track: TrackRef, origin: Origin) -> Result<()> {
        self.begin(track, origin);
        self.play_current(Duration::ZERO).await
    }

    /// Make `track` current without sounding anything yet
    fn begin(&mut self, track: TrackRef, origin: Origin) {
        self.invalidate_next();
        self.scheduler.stop(&mut self.session);
        let previous = self.session.current_track.clone();
        self.queues
            .begin_track(&mut self.session, track.clone(), origin);
        self.after_queue_mutation();
        self.emit(PlayerEvent::TrackChanged {
            track,
            previous,
            gapless: false,
        });
    }

    /// The current track cannot play: go idle, keeping it and the queues
    fn abandon_current(&mut self) {
        self.invalidate_next();
        self.scheduler.stop(&mut self.session);
        self.emit_state();
    }

    /// Decode the current track and sound it from `offset`
    async fn play_current(&mut self, offset: Duration) -> Result<()> {
        let track = self
            .session
            .current_track
            .clone()
            .ok_or(PlaybackError::NoTrackLoaded)?;

        let buffer = match self.gateway.decode(&track).await {
            Ok(buffer) => buffer,
            Err(e) => {
                self.report_decode_failure(&track, &e);
                self.abandon_current();
                return Err(e.into());
            }
        };

        let played = self.scheduler.play(&mut self.session, track, buffer, offset);
        self.emit_state();
        played?;
        self.prepare_next();
        Ok(())
    }

    /// Resolve the follower and get it decoded and armed
    fn prepare_next(&mut self) {
        let Some((track, origin)) = self.queues.resolve_next(&self.session) else {
            self.session.next_track = None;
            self.pending_next = None;
            return;
        };

        self.session.next_track = Some(track.clone());
        self.generation += 1;
        self.pending_next = Some((track.clone(), origin));
        self.prefetching = false;
        self.failed_next = None;

        if let Some(buffer) = self.gateway.cache().buffer(&track) {
            self.arm_next(track, origin, buffer);
            return;
        }

        self.prefetching = true;
        let gateway = self.gateway.clone();
        let prefetch_tx = self.prefetch_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = gateway.decode(&track).await;
            // Receiver gone means the transport shut down
            let _ = prefetch_tx.send(Prefetched {
                generation,
                track,
                origin,
                result,
            });
        });
    }

    fn handle_prefetched(&mut self, prefetched: Prefetched) {
        let Prefetched {
            generation,
            track,
            origin,
            result,
        } = prefetched;

        if generation != self.generation {
            debug!(%track, "Discarding unwanted prefetch");
            return;
        }
        self.prefetching = false;
        if self.scheduler.state() != SchedulerState::Playing {
            debug!(%track, "Discarding prefetch, nothing is playing");
            return;
        }

        match result {
            Ok(buffer) => self.arm_next(track, origin, buffer),
            Err(e) => {
                self.report_decode_failure(&track, &e);
                self.failed_next = Some((track, e));
            }
        }
    }

    fn arm_next(&mut self, track: TrackRef, origin: Origin, buffer: Arc<DecodedBuffer>) {
        match self.scheduler.schedule_next(track.clone(), origin, buffer) {
            Ok(start_at) => self.emit(PlayerEvent::NextTrackScheduled { track, start_at }),
            Err(PlaybackError::FollowerTooLate { start_at, earliest }) => {
                debug!(
                    %track,
                    %start_at,
                    %earliest,
                    "Follower decoded too late to arm, starting it after the current end"
                );
            }
            Err(e) => {
                self.pending_next = None;
                warn!(%track, error = %e, "Failed to schedule next track");
            }
        }
    }

    /// Drop the armed follower and any outstanding prefetch result
    fn invalidate_next(&mut self) {
        self.generation += 1;
        self.pending_next = None;
        self.prefetching = false;
        self.failed_next = None;
        self.session.next_track = None;
        self.scheduler.cancel_scheduled();
    }

    /// Re-arm the follower if a queue edit changed what comes next
    fn reschedule_next(&mut self) {
        if self.scheduler.state() != SchedulerState::Playing {
            return;
        }
        if self.queues.resolve_next(&self.session) == self.pending_next {
            return;
        }
        self.invalidate_next();
        self.prepare_next();
    }

    /// Nothing left to play: retire the current track
    fn finish_session(&mut self) {
        self.queues.finish(&mut self.session);
        self.after_queue_mutation();
        self.emit_state();
        self.emit(PlayerEvent::Stopped);
    }

    fn after_queue_mutation(&mut self) {
        self.emit(PlayerEvent::QueueChanged(self.queues.snapshot()));
        let evicted = self
            .gateway
            .cache()
            .evict_stale(&self.queues.active_set(&self.session));
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Evicted stale cache entries");
        }
    }

    fn report_decode_failure(&self, track: &TrackRef, error: &DecodeError) {
        warn!(%track, error = %error, "Decode failed");
        self.emit(PlayerEvent::DecodeFailed {
            track: track.clone(),
            message: error.to_string(),
            missing_file: error.is_missing_file(),
        });
    }

    fn emit_state(&self) {
        self.emit(PlayerEvent::StateChanged {
            state: self.scheduler.state(),
        });
    }

    fn emit_modes(&self) {
        self.emit(PlayerEvent::ModesChanged {
            shuffle: self.session.shuffle,
            repeat: self.session.repeat,
        });
    }

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
