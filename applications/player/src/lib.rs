//! Cadence Player
//!
//! Command-line front end for the Cadence playback core: library import,
//! layered configuration, persisted settings and a line-based transport
//! console.

pub mod commands;
pub mod config;
pub mod error;
pub mod player;
pub mod settings;
pub mod ui;

pub use config::PlayerConfig;
pub use error::{PlayerError, Result};
