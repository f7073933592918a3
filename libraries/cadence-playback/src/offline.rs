//! Offline output
//!
//! An [`AudioOutput`] whose clock only moves when told to. Used headless
//! (the caller advances it from a timer) and in tests, where every source's
//! start, stop and end time can be inspected.

use crate::error::{PlaybackError, Result};
use crate::output::{AudioOutput, ClockTime, OutputEvent, SourceId, SourceRequest};
use cadence_core::duration_to_frames;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What happened to one source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: SourceId,
    /// Requested start time
    pub start_at: ClockTime,
    /// First frame of the buffer played
    pub offset_frames: u64,
    /// Playback rate
    pub rate: f32,
    /// Time the last frame would finish
    pub end_at: ClockTime,
    /// Time the source was stopped early, if it was
    pub stopped_at: Option<ClockTime>,
}

struct OfflineState {
    now: ClockTime,
    start_latency: u64,
    next_id: u64,
    volume: f32,
    active: BTreeMap<SourceId, ClockTime>,
    records: Vec<SourceRecord>,
    events: mpsc::UnboundedSender<OutputEvent>,
}

impl OfflineState {
    fn record_mut(&mut self, id: SourceId) -> Option<&mut SourceRecord> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    fn emit(&self, id: SourceId) {
        // Receiver gone means nobody is listening any more
        let _ = self.events.send(OutputEvent::SourceEnded(id));
    }
}

/// Manually clocked output
///
/// Clones share the same clock and sources.
#[derive(Clone)]
pub struct OfflineOutput {
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineOutput {
    /// Create an output and the receiver for its events
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutputEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let output = Self {
            state: Arc::new(Mutex::new(OfflineState {
                now: ClockTime::ZERO,
                start_latency: 0,
                next_id: 1,
                volume: 1.0,
                active: BTreeMap::new(),
                records: Vec::new(),
                events,
            })),
        };
        (output, receiver)
    }

    /// Move the clock forward, ending every source that runs out on the way
    ///
    /// Sources end in order of their end time.
    pub fn advance(&self, frames: u64) {
        let mut state = self.state.lock();
        state.now = state.now.after(frames);
        let now = state.now;

        let mut finished: Vec<(ClockTime, SourceId)> = state
            .active
            .iter()
            .filter(|(_, end_at)| **end_at <= now)
            .map(|(id, end_at)| (*end_at, *id))
            .collect();
        finished.sort();

        for (_, id) in finished {
            state.active.remove(&id);
            state.emit(id);
        }
    }

    /// Report `frames` as the earliest a new source can start after now
    pub fn set_start_latency(&self, frames: u64) {
        self.state.lock().start_latency = frames;
    }

    /// Advance by a wall-clock duration
    pub fn advance_by(&self, duration: Duration) {
        self.advance(duration_to_frames(duration));
    }

    /// Every source started so far, oldest first
    pub fn records(&self) -> Vec<SourceRecord> {
        self.state.lock().records.clone()
    }

    pub fn record(&self, id: SourceId) -> Option<SourceRecord> {
        self.state
            .lock()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    /// Sources still scheduled or sounding
    pub fn active_sources(&self) -> Vec<SourceId> {
        self.state.lock().active.keys().copied().collect()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }
}

impl AudioOutput for OfflineOutput {
    fn now(&self) -> ClockTime {
        self.state.lock().now
    }

    fn start_latency(&self) -> u64 {
        self.state.lock().start_latency
    }

    fn start(&mut self, request: SourceRequest) -> Result<SourceId> {
        if request.buffer.is_empty() {
            return Err(PlaybackError::Output("cannot start an empty buffer".to_string()));
        }

        let mut state = self.state.lock();
        let id = SourceId::new(state.next_id);
        state.next_id += 1;

        let end_at = request.end_at();
        state.active.insert(id, end_at);
        state.records.push(SourceRecord {
            id,
            start_at: request.start_at,
            offset_frames: request.offset_frames,
            rate: request.rate,
            end_at,
            stopped_at: None,
        });
        Ok(id)
    }

    fn stop(&mut self, id: SourceId) {
        let mut state = self.state.lock();
        if state.active.remove(&id).is_none() {
            return;
        }
        let now = state.now;
        if let Some(record) = state.record_mut(id) {
            record.stopped_at = Some(now);
        }
        state.emit(id);
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }
}
