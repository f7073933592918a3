mod audio;
mod metadata;
mod track;

pub use audio::{duration_to_frames, frames_to_duration, DecodedBuffer, CHANNELS, SAMPLE_RATE};
pub use metadata::{Picture, PicturePayload, TrackMetadata};
pub use track::TrackRef;
