/// Track metadata types
use crate::types::TrackRef;
use serde::{Deserialize, Serialize};

/// Flat tag mapping returned by a metadata lookup
///
/// Every field is optional; a file whose tags cannot be parsed yields an
/// empty value rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Track title
    pub title: Option<String>,
    /// Album title
    pub album: Option<String>,
    /// Performer list, in tag order
    pub performers: Vec<String>,
    /// Release year
    pub year: Option<u32>,
    /// Number of embedded pictures (fetched separately)
    pub picture_count: usize,
}

impl TrackMetadata {
    /// Whether no field was populated
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.album.is_none()
            && self.performers.is_empty()
            && self.year.is_none()
            && self.picture_count == 0
    }
}

/// Embedded picture, with base64 encoded data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    /// MIME type (e.g. `image/jpeg`), empty when unknown
    pub mime_type: String,
    /// Optional description from the tag
    pub description: Option<String>,
    /// Base64 encoded image bytes
    pub data: String,
}

/// Serialized payload of a picture transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicturePayload {
    /// Track the pictures belong to
    pub track: TrackRef,
    /// Pictures in tag order
    pub pictures: Vec<Picture>,
}
