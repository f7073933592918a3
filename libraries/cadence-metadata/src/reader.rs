/// Metadata lookup implementation using lofty
use crate::error::{MetadataError, Result};
use crate::spc;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cadence_core::{
    chunk_channel, transfer::DEFAULT_CHUNK_SIZE, ChunkReceiver, ChunkSender, MetadataLookup,
    Picture, PicturePayload, TrackMetadata, TrackRef,
};
use lofty::TaggedFileExt;
use std::sync::Arc;

/// In-flight chunks of a picture transfer
const TRANSFER_CAPACITY: usize = 8;

/// Metadata lookup backed by the lofty library
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyMetadataLookup;

impl LoftyMetadataLookup {
    /// Create a new metadata lookup
    pub fn new() -> Self {
        Self
    }

    /// Extract the flat mapping from a lofty tag
    fn extract_from_tag(tag: &lofty::Tag) -> TrackMetadata {
        let mut metadata = TrackMetadata {
            picture_count: tag.pictures().len(),
            ..TrackMetadata::default()
        };

        for item in tag.items() {
            let Some(text) = item.value().text() else {
                continue;
            };
            match item.key() {
                lofty::ItemKey::TrackTitle => {
                    metadata.title.get_or_insert_with(|| text.to_string());
                }
                lofty::ItemKey::AlbumTitle => {
                    metadata.album.get_or_insert_with(|| text.to_string());
                }
                lofty::ItemKey::TrackArtist => {
                    metadata.performers.push(text.to_string());
                }
                lofty::ItemKey::Year | lofty::ItemKey::RecordingDate => {
                    if metadata.year.is_none() {
                        metadata.year = parse_year(text);
                    }
                }
                _ => {}
            }
        }

        metadata
    }

    fn read_pictures(track: &TrackRef) -> Vec<Picture> {
        let tagged_file = match lofty::read_from_path(track.path()) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(track = %track, error = %e, "no readable tags");
                return Vec::new();
            }
        };

        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Vec::new();
        };

        tag.pictures()
            .iter()
            .map(|picture| Picture {
                mime_type: picture
                    .mime_type()
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                description: picture.description().map(str::to_string),
                data: STANDARD.encode(picture.data()),
            })
            .collect()
    }
}

impl MetadataLookup for LoftyMetadataLookup {
    fn lookup(&self, track: &TrackRef) -> TrackMetadata {
        if track.has_extension(&["spc"]) {
            return spc::read_id666(track.path()).unwrap_or_default();
        }

        let tagged_file = match lofty::read_from_path(track.path()) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(track = %track, error = %e, "tag parse failed");
                return TrackMetadata::default();
            }
        };

        tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .map(Self::extract_from_tag)
            .unwrap_or_default()
    }

    fn pictures(&self, track: &TrackRef, sink: ChunkSender) -> cadence_core::Result<()> {
        let pictures = if track.has_extension(&["spc"]) {
            Vec::new()
        } else {
            Self::read_pictures(track)
        };

        let payload = PicturePayload {
            track: track.clone(),
            pictures,
        };
        let bytes = serde_json::to_vec(&payload)?;
        sink.blocking_send_all(&bytes)?;
        sink.blocking_complete(track.clone())
    }
}

/// Leading four-digit year of a date tag ("1997", "1997-03-01")
fn parse_year(text: &str) -> Option<u32> {
    let digits: String = text.trim().chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Reassemble a picture transfer
///
/// # Errors
/// Fails if the producer ended without completing, or if the completion
/// names a different track than the payload
pub async fn collect_pictures(receiver: ChunkReceiver) -> Result<PicturePayload> {
    let transferred = receiver.collect().await?;
    let payload: PicturePayload = serde_json::from_slice(&transferred.bytes)
        .map_err(|e| MetadataError::Payload(e.to_string()))?;

    if payload.track != transferred.track {
        return Err(MetadataError::Payload(format!(
            "completion for {} carried pictures of {}",
            transferred.track, payload.track
        )));
    }
    Ok(payload)
}

/// Run a picture transfer end to end
///
/// The producer runs on a blocking worker while this task reassembles the
/// chunks it emits.
///
/// # Errors
/// Returns the producer's error if it failed, otherwise any reassembly error
pub async fn fetch_pictures(
    lookup: Arc<dyn MetadataLookup>,
    track: TrackRef,
) -> Result<PicturePayload> {
    let (sink, receiver) = chunk_channel(TRANSFER_CAPACITY, DEFAULT_CHUNK_SIZE);
    let producer = tokio::task::spawn_blocking(move || lookup.pictures(&track, sink));

    let collected = collect_pictures(receiver).await;
    producer
        .await
        .map_err(|e| MetadataError::Worker(e.to_string()))??;
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn years_come_from_the_leading_digits() {
        assert_eq!(parse_year("1997"), Some(1997));
        assert_eq!(parse_year(" 2004-05-11 "), Some(2004));
        assert_eq!(parse_year("97"), None);
        assert_eq!(parse_year("unknown"), None);
    }

    #[test]
    fn missing_file_yields_empty_metadata() {
        let lookup = LoftyMetadataLookup::new();
        let metadata = lookup.lookup(&TrackRef::from("/nonexistent/file.mp3"));
        assert!(metadata.is_empty());
    }

    #[tokio::test]
    async fn mismatched_completion_is_rejected() {
        let (sink, receiver) = chunk_channel(4, 16);
        let payload = PicturePayload {
            track: TrackRef::from("/music/a.flac"),
            pictures: Vec::new(),
        };
        let bytes = serde_json::to_vec(&payload).unwrap();
        sink.send_all(&bytes).await.unwrap();
        sink.complete(TrackRef::from("/music/b.flac")).await.unwrap();

        assert!(matches!(
            collect_pictures(receiver).await,
            Err(MetadataError::Payload(_))
        ));
    }
}
