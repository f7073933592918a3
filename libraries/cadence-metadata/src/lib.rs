//! Cadence Metadata
//!
//! Tag lookup and bulk library import for Cadence.
//!
//! This crate provides:
//! - [`LoftyMetadataLookup`]: the [`MetadataLookup`](cadence_core::MetadataLookup)
//!   collaborator, with ID666 support for SPC dumps
//! - Picture transfer over the chunked channel ([`fetch_pictures`],
//!   [`collect_pictures`])
//! - [`LibraryImporter`]: chunked, worker-pool import with progress reporting
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_core::{MetadataLookup, TrackRef};
//! use cadence_metadata::{LibraryConfig, LibraryImporter, LoftyMetadataLookup};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let lookup = Arc::new(LoftyMetadataLookup::new());
//! let metadata = lookup.lookup(&TrackRef::from("/music/song.mp3"));
//! println!("{:?}", metadata.title);
//!
//! let importer = LibraryImporter::new(LibraryConfig::default(), lookup);
//! let batch = importer.import(&[PathBuf::from("/music")], None).await?;
//! println!("{} tracks", batch.tracks.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod import;
mod reader;
mod spc;

pub use error::{MetadataError, Result};
pub use import::{
    ImportBatch, ImportFailure, ImportProgress, ImportedTrack, LibraryConfig, LibraryImporter,
};
pub use reader::{collect_pictures, fetch_pictures, LoftyMetadataLookup};
pub use spc::{parse_id666, read_id666};
