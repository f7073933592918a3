//! JSON file settings store
//!
//! The whole map is rewritten on every change; settings are a handful of keys.

use cadence_core::{CoreError, Result, SettingsStore};
use cadence_playback::{MAX_RATE, MIN_RATE};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Key under which the output volume is persisted
pub const VOLUME_KEY: &str = "volume";

/// Key under which the playback speed is persisted
pub const SPEED_KEY: &str = "playbackSpeed";

/// Settings persisted as a single JSON object
pub struct JsonFileSettings {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileSettings {
    /// Open the store at `path`; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes)? {
                Value::Object(map) => map,
                _ => {
                    return Err(CoreError::settings(format!(
                        "{} does not hold a JSON object",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value);
        self.persist(&values)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock();
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

/// Persisted volume, if one is stored and in range
pub fn stored_volume(settings: &dyn SettingsStore) -> Option<f32> {
    let volume = settings.get(VOLUME_KEY).ok()??.as_f64()? as f32;
    (0.0..=1.0).contains(&volume).then_some(volume)
}

/// Persisted playback speed, if one is stored and in range
pub fn stored_speed(settings: &dyn SettingsStore) -> Option<f32> {
    let speed = settings.get(SPEED_KEY).ok()??.as_f64()? as f32;
    (MIN_RATE..=MAX_RATE).contains(&speed).then_some(speed)
}
