//! Desktop audio output for Cadence using CPAL
//!
//! This crate provides [`CpalOutput`], the hardware implementation of
//! `cadence_playback::AudioOutput`: a sample clock counted in rendered
//! frames, and sources that start on an exact frame of that clock.
//!
//! # Features
//!
//! - Cross-platform audio output using CPAL
//! - Sample-accurate source start (gapless handoff between tracks)
//! - Late sources skip missed frames to stay on the timeline
//! - Variable playback rate (nearest-frame resampling, pitch follows rate)
//! - Linear volume control
//!
//! Playback runs at the fixed pipeline rate of 48 kHz; devices that cannot
//! open a 48 kHz float stream are rejected.
//!
//! # Example
//!
//! ```no_run
//! use cadence_output::{CpalOutput, OutputConfig};
//! use cadence_playback::AudioOutput;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut output, _events) = CpalOutput::new(&OutputConfig::default())?;
//! output.set_volume(0.5);
//! println!("clock at {}", output.now());
//! # Ok(())
//! # }
//! ```

mod config;
mod cpal_output;
mod error;
pub mod mixer;

pub use config::OutputConfig;
pub use cpal_output::CpalOutput;
pub use error::{OutputError, Result};
pub use mixer::{Mixer, MixerCommand, VOICE_CAPACITY};
