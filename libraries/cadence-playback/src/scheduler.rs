//! Gapless scheduler
//!
//! Plays the current buffer on the output clock and keeps at most one
//! follower armed to start on the exact frame the current one ends:
//!
//! ```text
//! clock ──────────────┬────────────────────┬──────────────▶
//!                 start_at             end_at = next.start_at
//!                     │◀── frames - offset ─▶│
//!                     [ current source      ][ scheduled source ...
//! ```
//!
//! A follower whose start time is no longer reachable (the current source
//! already ended, or ends inside the output's start latency) is not armed;
//! the track then starts from its first frame after a gap.
//!
//! End-of-source notifications are matched against the current source id.
//! Anything else (a replaced source, a cancelled follower, an end caused by
//! pause or stop) is stale and ignored.

use crate::error::{PlaybackError, Result};
use crate::output::{clock_frames, source_frames, AudioOutput, ClockTime, SourceId, SourceRequest};
use crate::session::PlaybackSession;
use crate::types::{Origin, SchedulerState};
use cadence_core::{duration_to_frames, frames_to_duration, DecodedBuffer, TrackRef};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Source currently sounding
#[derive(Debug, Clone)]
pub struct ActiveSource {
    pub track: TrackRef,
    pub id: SourceId,
    pub buffer: Arc<DecodedBuffer>,
    pub start_at: ClockTime,
    pub offset_frames: u64,
    pub rate: f32,
}

impl ActiveSource {
    /// Clock time the last frame finishes
    pub fn end_at(&self) -> ClockTime {
        let remaining = (self.buffer.frames() as u64).saturating_sub(self.offset_frames);
        self.start_at.after(clock_frames(remaining, self.rate))
    }
}

/// Follower armed on the output clock
#[derive(Debug, Clone)]
pub struct ScheduledSource {
    pub track: TrackRef,
    pub id: SourceId,
    pub origin: Origin,
    pub buffer: Arc<DecodedBuffer>,
    pub start_at: ClockTime,
    pub rate: f32,
}

/// Result of an end-of-source notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEnd {
    /// Not the current source, or playback was paused/stopped
    Stale,

    /// The scheduled follower took over without a gap
    Advanced {
        finished: TrackRef,
        track: TrackRef,
        origin: Origin,
    },

    /// The current track ended with nothing scheduled
    Finished { track: TrackRef },
}

/// Scheduler over an [`AudioOutput`]
pub struct Scheduler<O: AudioOutput> {
    output: O,
    state: SchedulerState,
    current: Option<ActiveSource>,
    scheduled: Option<ScheduledSource>,

    /// Rate applied to every source started from now on
    rate: f32,

    /// Set by pause/stop so the resulting end events are not taken as
    /// natural track ends
    user_stopped: bool,
}

impl<O: AudioOutput> Scheduler<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            state: SchedulerState::Idle,
            current: None,
            scheduled: None,
            rate: 1.0,
            user_stopped: false,
        }
    }

    // ===== Accessors =====

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn current(&self) -> Option<&ActiveSource> {
        self.current.as_ref()
    }

    pub fn scheduled(&self) -> Option<&ScheduledSource> {
        self.scheduled.as_ref()
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn now(&self) -> ClockTime {
        self.output.now()
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Position within the current track
    pub fn elapsed(&self, session: &PlaybackSession) -> Duration {
        match self.state {
            SchedulerState::Playing | SchedulerState::SeekingRestart => {
                let Some(current) = &self.current else {
                    return Duration::ZERO;
                };
                let played =
                    source_frames(self.output.now().since(current.start_at), current.rate);
                let position = (current.offset_frames + played).min(current.buffer.frames() as u64);
                frames_to_duration(position)
            }
            SchedulerState::Paused => session.paused_at,
            SchedulerState::Idle => Duration::ZERO,
        }
    }

    // ===== Transport =====

    /// Start `buffer` from `offset` as the current source
    ///
    /// Any previous current or scheduled source is released first. If the
    /// output refuses the source the scheduler falls back to idle.
    pub fn play(
        &mut self,
        session: &mut PlaybackSession,
        track: TrackRef,
        buffer: Arc<DecodedBuffer>,
        offset: Duration,
    ) -> Result<()> {
        let offset_frames = duration_to_frames(offset);
        if offset_frames > buffer.frames() as u64 {
            return Err(PlaybackError::InvalidSeekPosition(offset));
        }

        self.release_all();
        let start_at = self.output.now().after(self.output.start_latency());
        let request = SourceRequest {
            buffer: buffer.clone(),
            start_at,
            offset_frames,
            rate: self.rate,
        };

        let id = match self.output.start(request) {
            Ok(id) => id,
            Err(e) => {
                self.current = None;
                self.state = SchedulerState::Idle;
                session.playing = false;
                return Err(e);
            }
        };

        debug!(%track, %id, %start_at, ?offset, "Started source");
        self.current = Some(ActiveSource {
            track,
            id,
            buffer,
            start_at,
            offset_frames,
            rate: self.rate,
        });
        session.playback_start = start_at;
        session.start_offset = offset;
        session.paused_at = Duration::ZERO;
        session.playing = true;
        self.user_stopped = false;
        self.state = SchedulerState::Playing;
        Ok(())
    }

    /// Stop sounding and remember the position
    ///
    /// The current buffer stays loaded so a paused seek can be validated.
    pub fn pause(&mut self, session: &mut PlaybackSession) {
        if self.state != SchedulerState::Playing {
            return;
        }
        session.paused_at = self.elapsed(session);
        session.playing = false;
        self.user_stopped = true;
        self.cancel_scheduled();
        if let Some(current) = &self.current {
            self.output.stop(current.id);
        }
        self.state = SchedulerState::Paused;
        debug!(position = ?session.paused_at, "Paused");
    }

    /// Jump within the current track
    ///
    /// While playing the source is restarted at the new offset (the
    /// follower is released and must be scheduled again). While paused only
    /// the resume position moves.
    pub fn seek(&mut self, session: &mut PlaybackSession, position: Duration) -> Result<()> {
        let current = self.current.clone().ok_or(PlaybackError::NoTrackLoaded)?;
        if position > current.buffer.duration() {
            return Err(PlaybackError::InvalidSeekPosition(position));
        }

        match self.state {
            SchedulerState::Playing => {
                self.state = SchedulerState::SeekingRestart;
                self.play(session, current.track, current.buffer, position)
            }
            SchedulerState::Paused => {
                session.paused_at = position;
                Ok(())
            }
            SchedulerState::Idle | SchedulerState::SeekingRestart => Err(
                PlaybackError::InvalidOperation(format!("cannot seek while {:?}", self.state)),
            ),
        }
    }

    /// Rate for sources started after this call
    ///
    /// Sources already sounding keep theirs; restarting them is up to the
    /// caller.
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    /// Release every source and go idle
    pub fn stop(&mut self, session: &mut PlaybackSession) {
        self.user_stopped = true;
        self.release_all();
        session.playing = false;
        session.paused_at = Duration::ZERO;
        self.state = SchedulerState::Idle;
    }

    // ===== Follower =====

    /// Arm `buffer` to start the frame the current source ends
    ///
    /// Replaces any follower already armed. Returns the start time.
    ///
    /// # Errors
    /// `FollowerTooLate` when the current source ends before the output
    /// could start anything; nothing is armed then.
    pub fn schedule_next(
        &mut self,
        track: TrackRef,
        origin: Origin,
        buffer: Arc<DecodedBuffer>,
    ) -> Result<ClockTime> {
        if self.state != SchedulerState::Playing {
            return Err(PlaybackError::InvalidOperation(format!(
                "cannot schedule while {:?}",
                self.state
            )));
        }
        let start_at = self
            .current
            .as_ref()
            .map(ActiveSource::end_at)
            .ok_or(PlaybackError::NoTrackLoaded)?;
        let earliest = self.output.now().after(self.output.start_latency());
        if start_at < earliest {
            return Err(PlaybackError::FollowerTooLate { start_at, earliest });
        }

        self.cancel_scheduled();
        let id = self.output.start(SourceRequest {
            buffer: buffer.clone(),
            start_at,
            offset_frames: 0,
            rate: self.rate,
        })?;

        debug!(%track, %id, %start_at, "Scheduled follower");
        self.scheduled = Some(ScheduledSource {
            track,
            id,
            origin,
            buffer,
            start_at,
            rate: self.rate,
        });
        Ok(start_at)
    }

    /// Disarm the follower, if any
    pub fn cancel_scheduled(&mut self) {
        if let Some(scheduled) = self.scheduled.take() {
            trace!(id = %scheduled.id, "Cancelled follower");
            self.output.stop(scheduled.id);
        }
    }

    // ===== Output events =====

    /// Handle an end-of-source notification from the output
    pub fn on_source_ended(&mut self, session: &mut PlaybackSession, id: SourceId) -> SourceEnd {
        let is_current = self.current.as_ref().map(|current| current.id) == Some(id);
        if self.user_stopped || self.state != SchedulerState::Playing || !is_current {
            trace!(%id, "Ignoring stale source end");
            return SourceEnd::Stale;
        }

        let Some(finished) = self.current.take() else {
            return SourceEnd::Stale;
        };

        match self.scheduled.take() {
            Some(next) => {
                session.playback_start = next.start_at;
                session.start_offset = Duration::ZERO;
                self.current = Some(ActiveSource {
                    track: next.track.clone(),
                    id: next.id,
                    buffer: next.buffer,
                    start_at: next.start_at,
                    offset_frames: 0,
                    rate: next.rate,
                });
                SourceEnd::Advanced {
                    finished: finished.track,
                    track: next.track,
                    origin: next.origin,
                }
            }
            None => {
                self.state = SchedulerState::Idle;
                session.playing = false;
                SourceEnd::Finished {
                    track: finished.track,
                }
            }
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.output.set_volume(volume);
    }

    fn release_all(&mut self) {
        self.cancel_scheduled();
        if let Some(current) = self.current.take() {
            self.output.stop(current.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::OfflineOutput;
    use crate::output::OutputEvent;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn track(name: &str) -> TrackRef {
        TrackRef::new(format!("/music/{}.flac", name))
    }

    fn buffer(frames: usize) -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::silence(frames))
    }

    fn setup() -> (
        Scheduler<OfflineOutput>,
        OfflineOutput,
        UnboundedReceiver<OutputEvent>,
        PlaybackSession,
    ) {
        let (output, events) = OfflineOutput::new();
        (
            Scheduler::new(output.clone()),
            output,
            events,
            PlaybackSession::new(),
        )
    }

    fn ended(events: &mut UnboundedReceiver<OutputEvent>) -> Vec<SourceId> {
        let mut ids = Vec::new();
        while let Ok(OutputEvent::SourceEnded(id)) = events.try_recv() {
            ids.push(id);
        }
        ids
    }

    #[test]
    fn follower_starts_where_current_ends() {
        let (mut scheduler, clock, mut events, mut session) = setup();
        clock.advance(100);
        scheduler
            .play(&mut session, track("a"), buffer(1_000), Duration::ZERO)
            .unwrap();

        let start_at = scheduler
            .schedule_next(track("b"), Origin::Automatic, buffer(500))
            .unwrap();

        assert_eq!(start_at, ClockTime::from_frames(1_100));
        assert_eq!(session.playback_start, ClockTime::from_frames(100));

        clock.advance(1_000);
        let ids = ended(&mut events);
        assert_eq!(ids.len(), 1);

        let outcome = scheduler.on_source_ended(&mut session, ids[0]);
        assert_eq!(
            outcome,
            SourceEnd::Advanced {
                finished: track("a"),
                track: track("b"),
                origin: Origin::Automatic,
            }
        );
        assert_eq!(session.playback_start, start_at);
        assert_eq!(scheduler.current().unwrap().track, track("b"));
    }

    #[test]
    fn offset_shortens_current_segment() {
        let (mut scheduler, _clock, _events, mut session) = setup();
        let full = buffer(96_000);
        scheduler
            .play(&mut session, track("a"), full, Duration::from_millis(500))
            .unwrap();

        let start_at = scheduler
            .schedule_next(track("b"), Origin::Automatic, buffer(10))
            .unwrap();

        assert_eq!(start_at, ClockTime::from_frames(96_000 - 24_000));
    }

    #[test]
    fn end_without_follower_finishes() {
        let (mut scheduler, clock, mut events, mut session) = setup();
        scheduler
            .play(&mut session, track("a"), buffer(100), Duration::ZERO)
            .unwrap();
        clock.advance(100);

        let id = ended(&mut events)[0];
        let outcome = scheduler.on_source_ended(&mut session, id);

        assert_eq!(outcome, SourceEnd::Finished { track: track("a") });
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!session.playing);
    }

    #[test]
    fn pause_releases_follower_and_ignores_resulting_end() {
        let (mut scheduler, clock, mut events, mut session) = setup();
        scheduler
            .play(&mut session, track("a"), buffer(48_000), Duration::ZERO)
            .unwrap();
        scheduler
            .schedule_next(track("b"), Origin::Automatic, buffer(100))
            .unwrap();
        clock.advance(12_000);

        scheduler.pause(&mut session);

        assert_eq!(scheduler.state(), SchedulerState::Paused);
        assert_eq!(session.paused_at, Duration::from_millis(250));
        assert!(scheduler.scheduled().is_none());
        assert!(clock.active_sources().is_empty());

        for id in ended(&mut events) {
            assert_eq!(scheduler.on_source_ended(&mut session, id), SourceEnd::Stale);
        }
        assert_eq!(scheduler.state(), SchedulerState::Paused);
    }

    #[test]
    fn replaced_source_end_is_stale() {
        let (mut scheduler, _clock, mut events, mut session) = setup();
        scheduler
            .play(&mut session, track("a"), buffer(1_000), Duration::ZERO)
            .unwrap();
        scheduler
            .play(&mut session, track("b"), buffer(1_000), Duration::ZERO)
            .unwrap();

        let ids = ended(&mut events);
        assert_eq!(ids.len(), 1);
        assert_eq!(scheduler.on_source_ended(&mut session, ids[0]), SourceEnd::Stale);
        assert_eq!(scheduler.state(), SchedulerState::Playing);
        assert_eq!(scheduler.current().unwrap().track, track("b"));
    }

    #[test]
    fn seek_while_playing_restarts_from_offset() {
        let (mut scheduler, clock, _events, mut session) = setup();
        scheduler
            .play(&mut session, track("a"), buffer(480_000), Duration::ZERO)
            .unwrap();
        scheduler
            .schedule_next(track("b"), Origin::Automatic, buffer(100))
            .unwrap();
        clock.advance(1_000);

        scheduler.seek(&mut session, Duration::from_secs(5)).unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Playing);
        assert!(scheduler.scheduled().is_none());
        assert_eq!(session.start_offset, Duration::from_secs(5));
        assert_eq!(scheduler.elapsed(&session), Duration::from_secs(5));
        clock.advance(48_000);
        assert_eq!(scheduler.elapsed(&session), Duration::from_secs(6));
    }

    #[test]
    fn seek_while_paused_moves_resume_point_only() {
        let (mut scheduler, _clock, _events, mut session) = setup();
        scheduler
            .play(&mut session, track("a"), buffer(480_000), Duration::ZERO)
            .unwrap();
        scheduler.pause(&mut session);

        scheduler.seek(&mut session, Duration::from_secs(7)).unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Paused);
        assert_eq!(session.paused_at, Duration::from_secs(7));
        assert_eq!(scheduler.elapsed(&session), Duration::from_secs(7));
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let (mut scheduler, _clock, _events, mut session) = setup();
        scheduler
            .play(&mut session, track("a"), buffer(48_000), Duration::ZERO)
            .unwrap();

        let result = scheduler.seek(&mut session, Duration::from_secs(2));

        assert!(matches!(result, Err(PlaybackError::InvalidSeekPosition(_))));
        assert_eq!(scheduler.state(), SchedulerState::Playing);
    }

    #[test]
    fn seek_without_track_fails() {
        let (mut scheduler, _clock, _events, mut session) = setup();
        assert!(matches!(
            scheduler.seek(&mut session, Duration::ZERO),
            Err(PlaybackError::NoTrackLoaded)
        ));
    }

    #[test]
    fn rescheduling_cancels_previous_follower() {
        let (mut scheduler, clock, mut events, mut session) = setup();
        scheduler
            .play(&mut session, track("a"), buffer(1_000), Duration::ZERO)
            .unwrap();
        scheduler
            .schedule_next(track("b"), Origin::Automatic, buffer(100))
            .unwrap();
        let first = scheduler.scheduled().unwrap().id;

        scheduler
            .schedule_next(track("c"), Origin::Manual, buffer(100))
            .unwrap();

        assert_eq!(ended(&mut events), vec![first]);
        assert_eq!(clock.active_sources().len(), 2);
        assert_eq!(scheduler.scheduled().unwrap().track, track("c"));
    }

    #[test]
    fn follower_is_refused_once_current_has_run_out() {
        let (mut scheduler, clock, _events, mut session) = setup();
        scheduler
            .play(&mut session, track("a"), buffer(1_000), Duration::ZERO)
            .unwrap();
        // The end event is still in flight
        clock.advance(1_500);

        let result = scheduler.schedule_next(track("b"), Origin::Automatic, buffer(500));

        assert!(matches!(
            result,
            Err(PlaybackError::FollowerTooLate { start_at, earliest })
                if start_at == ClockTime::from_frames(1_000)
                    && earliest == ClockTime::from_frames(1_500)
        ));
        assert!(scheduler.scheduled().is_none());
        assert_eq!(clock.records().len(), 1);
    }

    #[test]
    fn follower_is_refused_inside_start_latency() {
        let (mut scheduler, clock, _events, mut session) = setup();
        clock.set_start_latency(256);
        scheduler
            .play(&mut session, track("a"), buffer(1_000), Duration::ZERO)
            .unwrap();
        assert_eq!(session.playback_start, ClockTime::from_frames(256));

        clock.advance(1_000);
        assert!(scheduler
            .schedule_next(track("b"), Origin::Automatic, buffer(500))
            .is_ok());

        scheduler.cancel_scheduled();
        clock.advance(1);
        assert!(matches!(
            scheduler.schedule_next(track("b"), Origin::Automatic, buffer(500)),
            Err(PlaybackError::FollowerTooLate { .. })
        ));
    }

    #[test]
    fn rate_applies_to_current_and_follower() {
        let (mut scheduler, clock, _events, mut session) = setup();
        scheduler.set_rate(2.0);
        scheduler
            .play(&mut session, track("a"), buffer(48_000), Duration::ZERO)
            .unwrap();

        let start_at = scheduler
            .schedule_next(track("b"), Origin::Automatic, buffer(500))
            .unwrap();
        assert_eq!(start_at, ClockTime::from_frames(24_000));
        assert_eq!(clock.records()[1].rate, 2.0);

        clock.advance(12_000);
        assert_eq!(scheduler.elapsed(&session), Duration::from_millis(500));
    }

    #[test]
    fn schedule_requires_playing() {
        let (mut scheduler, _clock, _events, _session) = setup();
        assert!(scheduler
            .schedule_next(track("b"), Origin::Automatic, buffer(100))
            .is_err());
    }

    #[test]
    fn empty_buffer_leaves_scheduler_idle() {
        let (mut scheduler, _clock, _events, mut session) = setup();
        let result = scheduler.play(&mut session, track("a"), buffer(0), Duration::ZERO);

        assert!(result.is_err());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!session.playing);
    }
}
