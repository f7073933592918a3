//! Queue manager
//!
//! Three ordered sequences of track references and the rules that decide
//! what plays after the current track:
//!
//! ```text
//! Current: Track A
//! ─────────────────────────────
//! Manual queue (user, play next):
//!   - Track X
//! ─────────────────────────────
//! Automatic queue (view / shuffle / repeat, capped):
//!   - Track B
//!   - Track C
//! ─────────────────────────────
//! History (most recent last):
//!   - Track W
//! ```
//!
//! Next resolution: repeat = file replays the current track, otherwise the
//! manual head, otherwise the automatic head.

use crate::events::QueueSnapshot;
use crate::session::PlaybackSession;
use crate::shuffle::shuffled_excluding;
use crate::types::{Origin, PlaybackConfig, QueueKind, RepeatMode};
use cadence_core::TrackRef;
use rand::thread_rng;
use std::collections::{HashSet, VecDeque};

/// Owner of the manual, automatic and history queues
#[derive(Debug, Clone)]
pub struct QueueManager {
    manual: VecDeque<TrackRef>,
    automatic: VecDeque<TrackRef>,

    /// Played tracks, most recent last; grows on every advance and only
    /// "previous" takes from it
    history: Vec<TrackRef>,

    /// Maximum automatic queue length
    cap: usize,

    /// Live view order (sort/filter applied)
    view: Vec<TrackRef>,

    /// View order frozen when a track was chosen from it
    anchor_view: Option<Vec<TrackRef>>,

    /// Ring for repeat = set, captured when repeat was engaged
    repeat_snapshot: Vec<TrackRef>,

    /// Queue the current track was drawn from
    current_origin: Option<QueueKind>,
}

impl QueueManager {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            manual: VecDeque::new(),
            automatic: VecDeque::new(),
            history: Vec::new(),
            cap: config.automatic_queue_cap,
            view: Vec::new(),
            anchor_view: None,
            repeat_snapshot: Vec::new(),
            current_origin: None,
        }
    }

    // ===== Accessors =====

    pub fn manual(&self) -> &VecDeque<TrackRef> {
        &self.manual
    }

    pub fn automatic(&self) -> &VecDeque<TrackRef> {
        &self.automatic
    }

    /// Played tracks, oldest first
    pub fn history(&self) -> &[TrackRef] {
        &self.history
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn view(&self) -> &[TrackRef] {
        &self.view
    }

    pub fn repeat_snapshot(&self) -> &[TrackRef] {
        &self.repeat_snapshot
    }

    /// Queue the current track was drawn from
    pub fn current_origin(&self) -> Option<QueueKind> {
        self.current_origin
    }

    /// Current track plus both queues; cache entries for these are kept
    pub fn active_set(&self, session: &PlaybackSession) -> HashSet<TrackRef> {
        session
            .current_track
            .iter()
            .chain(self.manual.iter())
            .chain(self.automatic.iter())
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            manual: self.manual.iter().cloned().collect(),
            automatic: self.automatic.iter().cloned().collect(),
            history: self.history.clone(),
        }
    }

    // ===== Resolution =====

    /// What plays after the current track, without consuming anything
    pub fn resolve_next(&self, session: &PlaybackSession) -> Option<(TrackRef, Origin)> {
        if session.repeat == RepeatMode::File {
            if let Some(current) = &session.current_track {
                return Some((current.clone(), Origin::RepeatFile));
            }
        }
        if let Some(track) = self.manual.front() {
            return Some((track.clone(), Origin::Manual));
        }
        self.automatic
            .front()
            .map(|track| (track.clone(), Origin::Automatic))
    }

    /// What play should start when nothing is loaded
    ///
    /// Manual head, then automatic head, then the first view row.
    pub fn first_playable(&self) -> Option<(TrackRef, Origin)> {
        if let Some(track) = self.manual.front() {
            return Some((track.clone(), Origin::Manual));
        }
        if let Some(track) = self.automatic.front() {
            return Some((track.clone(), Origin::Automatic));
        }
        self.view.first().map(|track| (track.clone(), Origin::View))
    }

    // ===== Track transitions =====

    /// Book-keep `track` becoming current
    ///
    /// The outgoing track goes to history unless the new one came from
    /// history. The consumed queue entry is removed and the automatic queue
    /// is refilled.
    pub fn begin_track(&mut self, session: &mut PlaybackSession, track: TrackRef, origin: Origin) {
        let outgoing = session.current_track.take();
        if origin != Origin::History {
            if let Some(outgoing) = &outgoing {
                self.history.push(outgoing.clone());
            }
        }

        match origin {
            Origin::Manual => remove_first(&mut self.manual, &track),
            Origin::Automatic | Origin::RepeatFile => remove_first(&mut self.automatic, &track),
            Origin::View => {
                self.automatic.clear();
                self.anchor_view = Some(self.view.clone());
            }
            Origin::History => {}
        }

        self.current_origin = origin.queue();
        session.previous_track = outgoing;
        session.current_track = Some(track);
        session.next_track = None;
        self.refill(session);
    }

    /// Pop the most recent history entry for "previous"
    ///
    /// The current track goes back to the front of the queue it was drawn
    /// from (automatic when it came from the view or history).
    pub fn step_back(&mut self, session: &PlaybackSession) -> Option<TrackRef> {
        let previous = self.history.pop()?;
        if let Some(current) = session.current_track.clone() {
            if self.current_origin == Some(QueueKind::Manual) {
                self.manual.push_front(current);
            } else {
                self.automatic.push_front(current);
                self.automatic.truncate(self.cap);
            }
        }
        Some(previous)
    }

    /// Queues ran dry: retire the current track to history
    pub fn finish(&mut self, session: &mut PlaybackSession) {
        if let Some(track) = session.current_track.take() {
            self.history.push(track.clone());
            session.previous_track = Some(track);
        }
        session.next_track = None;
        self.current_origin = None;
    }

    // ===== Manual edits =====

    /// Append to the manual queue
    pub fn enqueue(&mut self, track: TrackRef) {
        self.manual.push_back(track);
    }

    /// Insert at the head of the manual queue
    pub fn play_next(&mut self, track: TrackRef) {
        self.manual.push_front(track);
    }

    /// Remove one entry; a shrunken automatic queue is topped up again
    pub fn remove(
        &mut self,
        session: &PlaybackSession,
        queue: QueueKind,
        index: usize,
    ) -> Option<TrackRef> {
        match queue {
            QueueKind::Manual => self.manual.remove(index),
            QueueKind::Automatic => {
                let removed = self.automatic.remove(index);
                if removed.is_some() {
                    self.refill(session);
                }
                removed
            }
            QueueKind::History => None,
        }
    }

    /// Empty the manual or automatic queue; history is left alone
    pub fn clear(&mut self, queue: QueueKind) {
        match queue {
            QueueKind::Manual => self.manual.clear(),
            QueueKind::Automatic => self.automatic.clear(),
            QueueKind::History => {}
        }
    }

    /// Replace the live view order
    pub fn set_view(&mut self, view: Vec<TrackRef>) {
        self.view = view;
    }

    // ===== Mode changes =====

    /// Rebuild the automatic queue after shuffle was toggled
    ///
    /// Enabling draws a fresh random order; disabling restores the tracks
    /// after the current one in view order. Under repeat the queue belongs
    /// to the repeat mode and is left alone.
    pub fn on_shuffle_changed(&mut self, session: &PlaybackSession) {
        if session.repeat != RepeatMode::Off {
            return;
        }
        self.automatic.clear();
        if session.shuffle {
            self.fill_shuffled(session);
        } else {
            self.anchor_view = Some(self.view.clone());
            let start = session
                .current_track
                .as_ref()
                .and_then(|current| self.view.iter().position(|track| track == current))
                .map_or(0, |position| position + 1);
            self.fill_sequential_from(start);
        }
    }

    /// Rebuild the automatic queue after the repeat mode changed
    pub fn on_repeat_changed(&mut self, session: &PlaybackSession) {
        match session.repeat {
            RepeatMode::Set => {
                self.repeat_snapshot = match &session.current_track {
                    Some(current) => std::iter::once(current)
                        .chain(self.automatic.iter())
                        .cloned()
                        .collect(),
                    None => self.view.iter().take(self.cap).cloned().collect(),
                };
                self.refill(session);
            }
            RepeatMode::File => self.refill(session),
            RepeatMode::Off => {
                self.repeat_snapshot.clear();
                self.automatic.clear();
                self.refill(session);
            }
        }
    }

    // ===== Refill =====

    /// Top up the automatic queue according to the active mode
    pub fn refill(&mut self, session: &PlaybackSession) {
        match session.repeat {
            RepeatMode::File => self.fill_repeat_file(session),
            RepeatMode::Set => self.fill_from_snapshot(session),
            RepeatMode::Off if session.shuffle => self.fill_shuffled(session),
            RepeatMode::Off => self.fill_sequential(session),
        }
    }

    fn fill_repeat_file(&mut self, session: &PlaybackSession) {
        self.automatic.clear();
        if let Some(current) = &session.current_track {
            self.automatic
                .extend(std::iter::repeat(current.clone()).take(self.cap));
        }
    }

    /// Automatic length under repeat = set: one lap of the ring ahead
    fn set_capacity(&self) -> usize {
        self.cap
            .min(self.repeat_snapshot.len().saturating_sub(1).max(1))
    }

    fn fill_from_snapshot(&mut self, session: &PlaybackSession) {
        let len = self.repeat_snapshot.len();
        if len == 0 {
            return;
        }
        let target = self.set_capacity();
        let anchor = self.automatic.back().or(session.current_track.as_ref());
        let mut index = anchor
            .and_then(|anchor| self.repeat_snapshot.iter().position(|track| track == anchor))
            .map_or(0, |position| position + 1);

        while self.automatic.len() < target {
            self.automatic
                .push_back(self.repeat_snapshot[index % len].clone());
            index += 1;
        }
    }

    fn fill_shuffled(&mut self, session: &PlaybackSession) {
        let room = self.cap.saturating_sub(self.automatic.len());
        if room == 0 {
            return;
        }
        let candidates = {
            let exclude: HashSet<&TrackRef> = self
                .automatic
                .iter()
                .chain(session.current_track.iter())
                .collect();
            shuffled_excluding(&self.view, &exclude, &mut thread_rng())
        };
        self.automatic.extend(candidates.into_iter().take(room));
    }

    fn fill_sequential(&mut self, session: &PlaybackSession) {
        let anchor = self
            .automatic
            .back()
            .or(session.current_track.as_ref())
            .cloned();
        let start = match anchor {
            Some(anchor) => match self.order().iter().position(|track| *track == anchor) {
                Some(position) => position + 1,
                None => return,
            },
            None => 0,
        };
        self.fill_sequential_from(start);
    }

    fn fill_sequential_from(&mut self, start: usize) {
        let room = self.cap.saturating_sub(self.automatic.len());
        let following: Vec<TrackRef> = self
            .order()
            .iter()
            .skip(start)
            .take(room)
            .cloned()
            .collect();
        self.automatic.extend(following);
    }

    /// Order sequential refills follow
    fn order(&self) -> &[TrackRef] {
        self.anchor_view.as_deref().unwrap_or(&self.view)
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}

fn remove_first(queue: &mut VecDeque<TrackRef>, track: &TrackRef) {
    if let Some(position) = queue.iter().position(|queued| queued == track) {
        queue.remove(position);
    }
}
