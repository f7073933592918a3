/// Collaborator traits
///
/// The playback core calls out to these for anything it does not own: tag
/// reading and persisted user settings.
use crate::error::Result;
use crate::transfer::ChunkSender;
use crate::types::{TrackMetadata, TrackRef};

/// File metadata lookup
///
/// Both methods are blocking; async callers run them on a blocking worker.
pub trait MetadataLookup: Send + Sync {
    /// Read the flat tag mapping for a track
    ///
    /// Parse failures yield an empty or partial mapping, never an error.
    fn lookup(&self, track: &TrackRef) -> TrackMetadata;

    /// Stream the track's pictures as a serialized
    /// [`PicturePayload`](crate::types::PicturePayload)
    ///
    /// The producer sends bounded chunks through `sink` and finishes with a
    /// completion signal carrying `track`.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized or the consumer
    /// hung up
    fn pictures(&self, track: &TrackRef, sink: ChunkSender) -> Result<()>;
}

/// Persistent key/value settings
///
/// Synchronous from the caller's perspective. Values are JSON so a backend
/// never needs to know the shape of what it stores.
pub trait SettingsStore: Send + Sync {
    /// Read a value, `None` if unset
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Write a value
    fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove a value; removing an unset key is not an error
    fn delete(&self, key: &str) -> Result<()>;
}
