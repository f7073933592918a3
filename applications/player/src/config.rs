/// Player configuration
use crate::error::{PlayerError, Result};
use cadence_decoder::DecoderConfig;
use cadence_metadata::LibraryConfig;
use cadence_output::OutputConfig;
use cadence_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "cadence.toml";

/// Prefix of environment overrides, e.g. `CADENCE_PLAYBACK__AUTOMATIC_QUEUE_CAP`
pub const ENV_PREFIX: &str = "CADENCE";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub playback: PlaybackConfig,
    pub decoder: DecoderConfig,
    pub output: OutputConfig,
    pub library: LibraryConfig,

    /// JSON file backing persisted settings
    pub settings_path: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            decoder: DecoderConfig::default(),
            output: OutputConfig::default(),
            library: LibraryConfig::default(),
            settings_path: PathBuf::from("cadence-settings.json"),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `cadence.toml` in the working
    /// directory is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub(crate) fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut settings = config::Config::builder();

        settings = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(PlayerError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings.add_source(config::File::from(path))
            }
            None => settings
                .add_source(config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false)),
        };

        // Override with environment variables (CADENCE_SECTION__KEY)
        settings = settings.add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.playback.automatic_queue_cap == 0 {
            return Err(PlayerError::Config(
                "playback.automatic_queue_cap must be at least 1".to_string(),
            ));
        }
        if self.decoder.stream_chunk_bytes == 0 {
            return Err(PlayerError::Config(
                "decoder.stream_chunk_bytes must be at least 1".to_string(),
            ));
        }
        if self.decoder.deinterleave_chunk_frames == 0 {
            return Err(PlayerError::Config(
                "decoder.deinterleave_chunk_frames must be at least 1".to_string(),
            ));
        }
        if self.library.import_chunk_size == 0 {
            return Err(PlayerError::Config(
                "library.import_chunk_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.output.volume) {
            return Err(PlayerError::Config(format!(
                "output.volume must be within [0, 1], got {}",
                self.output.volume
            )));
        }
        Ok(())
    }
}
