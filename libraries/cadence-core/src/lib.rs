//! Cadence Core
//!
//! Shared building blocks for the Cadence player.
//!
//! This crate provides:
//! - **Domain Types**: [`TrackRef`], [`DecodedBuffer`], [`TrackMetadata`]
//! - **Collaborator Traits**: [`MetadataLookup`], [`SettingsStore`]
//! - **Chunked Transfer**: a bounded producer/consumer channel used for PCM
//!   streams and picture payloads
//! - **Error Handling**: [`CoreError`] and [`Result`]
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{DecodedBuffer, TrackRef, SAMPLE_RATE};
//!
//! let track = TrackRef::new("/music/intro.flac");
//! let buffer = DecodedBuffer::silence(SAMPLE_RATE as usize);
//!
//! assert_eq!(track.extension().as_deref(), Some("flac"));
//! assert_eq!(buffer.duration_secs(), 1.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod transfer;
pub mod types;

pub use error::{CoreError, Result};
pub use traits::{MetadataLookup, SettingsStore};
pub use transfer::{chunk_channel, ChunkReceiver, ChunkSender, TransferMessage, Transferred};
pub use types::{
    duration_to_frames, frames_to_duration, DecodedBuffer, Picture, PicturePayload,
    TrackMetadata, TrackRef, CHANNELS, SAMPLE_RATE,
};
