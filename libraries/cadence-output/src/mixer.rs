//! Frame mixer
//!
//! Sums every active source into the device buffer at the frame its start
//! time says it belongs, and advances the shared clock by one block per
//! callback. A source's position is always
//! `offset + (t - start_at) * rate`, so a source that arrives after its start
//! time skips the frames it missed instead of shifting the timeline.
//!
//! Everything here runs inside the audio callback: voice storage and the
//! undelivered-event buffer are allocated up front and ended sources are
//! reported over a bounded channel.

use cadence_core::DecodedBuffer;
use cadence_playback::{source_frames, ClockTime, OutputEvent, SourceId, SourceRequest};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Voices held without reallocating (current, follower and stopped stragglers)
pub const VOICE_CAPACITY: usize = 32;

/// Commands applied by the audio callback before each block
#[derive(Debug, Clone)]
pub enum MixerCommand {
    Start { id: SourceId, request: SourceRequest },
    Stop(SourceId),
    SetVolume(f32),
}

struct Voice {
    id: SourceId,
    request: SourceRequest,
    end_at: u64,
}

impl Voice {
    fn new(id: SourceId, request: SourceRequest) -> Self {
        let end_at = request.end_at().frames();
        Self {
            id,
            request,
            end_at,
        }
    }
}

/// Real-time mixer owned by the audio callback
pub struct Mixer {
    voices: Vec<Voice>,
    clock: Arc<AtomicU64>,
    volume: f32,
    events: Sender<OutputEvent>,

    /// Ends the event channel had no room for, retried every block
    undelivered: Vec<SourceId>,
}

impl Mixer {
    pub fn new(clock: Arc<AtomicU64>, events: Sender<OutputEvent>) -> Self {
        Self {
            voices: Vec::with_capacity(VOICE_CAPACITY),
            clock,
            volume: 1.0,
            events,
            undelivered: Vec::with_capacity(VOICE_CAPACITY),
        }
    }

    /// Current clock time
    pub fn now(&self) -> ClockTime {
        ClockTime::from_frames(self.clock.load(Ordering::Acquire))
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice_capacity(&self) -> usize {
        self.voices.capacity()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn apply(&mut self, command: MixerCommand) {
        match command {
            MixerCommand::Start { id, request } => self.voices.push(Voice::new(id, request)),
            MixerCommand::Stop(id) => {
                // Sources that already ended reported it then
                if let Some(index) = self.voices.iter().position(|voice| voice.id == id) {
                    self.voices.swap_remove(index);
                    self.emit(id);
                }
            }
            MixerCommand::SetVolume(volume) => self.volume = volume.clamp(0.0, 1.0),
        }
    }

    /// Fill `out` (interleaved, `channels` per frame) and advance the clock
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        self.redeliver();

        let channels = channels.max(1);
        out.fill(0.0);

        let frames = (out.len() / channels) as u64;
        let block_start = self.clock.load(Ordering::Acquire);
        let block_end = block_start + frames;

        for voice in &self.voices {
            let request = &voice.request;
            let start_at = request.start_at.frames();
            let from = block_start.max(start_at);
            let to = block_end.min(voice.end_at);
            if from >= to {
                continue;
            }

            let left = request.buffer.channel(0);
            let right = request.buffer.channel(1);
            let last = left.len().saturating_sub(1);
            for t in from..to {
                let played = source_frames(t - start_at, request.rate);
                let position = ((request.offset_frames + played) as usize).min(last);
                let frame = (t - block_start) as usize * channels;
                if channels == 1 {
                    out[frame] += 0.5 * (left[position] + right[position]);
                } else {
                    out[frame] += left[position];
                    out[frame + 1] += right[position];
                }
            }
        }

        if self.volume < 1.0 {
            for sample in out.iter_mut() {
                *sample *= self.volume;
            }
        }

        self.clock.store(block_end, Ordering::Release);
        self.retire(block_end);
    }

    /// Drop voices whose last frame has been rendered, in end order
    fn retire(&mut self, block_end: u64) {
        while let Some(index) = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, voice)| voice.end_at <= block_end)
            .min_by_key(|(_, voice)| voice.end_at)
            .map(|(index, _)| index)
        {
            let voice = self.voices.swap_remove(index);
            self.emit(voice.id);
        }
    }

    fn redeliver(&mut self) {
        while let Some(&id) = self.undelivered.first() {
            if let Err(TrySendError::Full(_)) = self.events.try_send(OutputEvent::SourceEnded(id)) {
                break;
            }
            self.undelivered.remove(0);
        }
    }

    fn emit(&mut self, id: SourceId) {
        if !self.undelivered.is_empty() {
            self.undelivered.push(id);
            return;
        }
        // Disconnected means the transport shut down
        if let Err(TrySendError::Full(_)) = self.events.try_send(OutputEvent::SourceEnded(id)) {
            self.undelivered.push(id);
        }
    }
}
