//! Sample cache
//!
//! Decoded buffers keyed by track. An entry is created the first time a track
//! is requested (before its buffer exists) and is only dropped by
//! [`SampleCache::evict_stale`], which spares anything still referenced by the
//! current track or either queue.

use cadence_core::{DecodedBuffer, TrackMetadata, TrackRef};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One cached track
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Track this entry belongs to
    pub track: TrackRef,
    /// Decoded audio, absent while a decode is in flight
    pub buffer: Option<Arc<DecodedBuffer>>,
    /// Tag metadata, filled in after decode
    pub metadata: Option<TrackMetadata>,
    /// When the track was first referenced
    pub created_at: Instant,
}

impl CacheEntry {
    fn new(track: TrackRef) -> Self {
        Self {
            track,
            buffer: None,
            metadata: None,
            created_at: Instant::now(),
        }
    }
}

/// Shared decoded-buffer store
///
/// Cloning yields another handle to the same store. The mapping sits behind a
/// mutex because decode completions land from worker tasks while the
/// playback timeline reads.
#[derive(Debug, Clone)]
pub struct SampleCache {
    entries: Arc<Mutex<HashMap<TrackRef, CacheEntry>>>,
    retention: Duration,
}

impl SampleCache {
    /// Default retention window (1 hour)
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    /// Retention window
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Snapshot of the entry for `track`
    pub fn get(&self, track: &TrackRef) -> Option<CacheEntry> {
        self.entries.lock().get(track).cloned()
    }

    /// Decoded buffer for `track`, if decode has completed
    pub fn buffer(&self, track: &TrackRef) -> Option<Arc<DecodedBuffer>> {
        self.entries
            .lock()
            .get(track)
            .and_then(|entry| entry.buffer.clone())
    }

    /// Metadata for `track`, if it has been looked up
    pub fn metadata(&self, track: &TrackRef) -> Option<TrackMetadata> {
        self.entries
            .lock()
            .get(track)
            .and_then(|entry| entry.metadata.clone())
    }

    /// Make sure an entry exists for `track`
    ///
    /// Returns `true` if the entry was created by this call.
    pub fn touch(&self, track: &TrackRef) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(track) {
            return false;
        }
        entries.insert(track.clone(), CacheEntry::new(track.clone()));
        true
    }

    /// Store a decoded buffer, replacing any previous one
    ///
    /// The entry keeps its original creation time.
    pub fn put(&self, track: TrackRef, buffer: Arc<DecodedBuffer>) {
        let mut entries = self.entries.lock();
        entries
            .entry(track.clone())
            .or_insert_with(|| CacheEntry::new(track))
            .buffer = Some(buffer);
    }

    /// Attach metadata to an existing entry
    ///
    /// Ignored if the entry was evicted in the meantime.
    pub fn set_metadata(&self, track: &TrackRef, metadata: TrackMetadata) {
        if let Some(entry) = self.entries.lock().get_mut(track) {
            entry.metadata = Some(metadata);
        }
    }

    /// Drop the entry for `track` if it never received a buffer
    ///
    /// Used after a failed decode so no placeholder lingers.
    pub fn discard_pending(&self, track: &TrackRef) {
        let mut entries = self.entries.lock();
        if entries
            .get(track)
            .is_some_and(|entry| entry.buffer.is_none())
        {
            entries.remove(track);
        }
    }

    /// Remove entries older than the retention window that are not in `active`
    ///
    /// `active` is the union of the current track and both queues. Returns the
    /// evicted tracks.
    pub fn evict_stale(&self, active: &HashSet<TrackRef>) -> Vec<TrackRef> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.entries.lock().retain(|track, entry| {
            let stale = now.saturating_duration_since(entry.created_at) > self.retention;
            if stale && !active.contains(track) {
                evicted.push(track.clone());
                false
            } else {
                true
            }
        });

        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "evicted stale cache entries");
        }
        evicted
    }

    /// Whether an entry exists for `track`
    pub fn contains(&self, track: &TrackRef) -> bool {
        self.entries.lock().contains_key(track)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for SampleCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETENTION)
    }
}
