//! Cadence Decoder
//!
//! Turns track references into decoded 48 kHz stereo buffers.
//!
//! This crate provides:
//! - [`DecoderGateway`]: one `decode(track)` contract over two decode paths
//!   (an external transcoding process, or an in-process chiptune renderer)
//!   with at most one decode in flight per track
//! - [`SampleCache`]: decoded buffers keyed by track, with time-based
//!   eviction that never touches tracks still in use
//! - [`FfmpegTranscoder`]: the external process implementation of
//!   [`Transcoder`], streaming raw PCM in 256 KiB chunks
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_decoder::{DecoderConfig, DecoderGateway, FfmpegTranscoder, SampleCache};
//! use cadence_core::TrackRef;
//! use std::sync::Arc;
//!
//! # async fn demo() -> cadence_decoder::Result<()> {
//! let config = DecoderConfig::default();
//! let cache = SampleCache::new(config.cache_retention());
//! let gateway = DecoderGateway::builder(config.clone(), cache)
//!     .transcoder(Arc::new(FfmpegTranscoder::new(&config.ffmpeg_path)))
//!     .build();
//!
//! let buffer = gateway.decode(&TrackRef::new("/music/song.flac")).await?;
//! println!("{:.1}s", buffer.duration_secs());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod chiptune;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pcm;
pub mod spc;
pub mod transcoder;

pub use cache::{CacheEntry, SampleCache};
pub use chiptune::ChiptuneRenderer;
pub use config::DecoderConfig;
pub use error::{DecodeError, Result};
pub use gateway::{DecoderGateway, GatewayBuilder};
pub use spc::SpcRenderer;
pub use transcoder::{FfmpegTranscoder, Transcoder};
