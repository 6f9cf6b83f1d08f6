use crate::app_dirs::AppDirs;
use crate::session::HeightSource;
use crate::stride::{HeightCm, InvalidHeight};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidHeight(#[from] InvalidHeight),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which step counter to use
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SensorKind {
    /// IIO step counter if one exists, otherwise none
    #[default]
    Auto,
    Iio,
    /// Keyboard/pacer driven counter
    Simulated,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub height_cm: HeightCm,
    pub activity_recognition_enabled: bool,
    pub sensor: SensorKind,
    /// Steps per minute fed to the simulated sensor
    pub cadence_spm: Option<u32>,
    pub iio_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            height_cm: HeightCm::default(),
            activity_recognition_enabled: false,
            sensor: SensorKind::Auto,
            cadence_spm: None,
            iio_poll_ms: 500,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;

    /// Validate and persist a new height, leaving other settings untouched
    fn save_height(&self, cm: u32) -> Result<HeightCm, ConfigError> {
        let height = HeightCm::new(cm)?;
        let mut cfg = self.load();
        cfg.height_cm = height;
        self.save(&cfg)?;
        log::info!("height saved: {height}");
        Ok(height)
    }

    fn save_activity_recognition_enabled(&self, enabled: bool) -> Result<(), ConfigError> {
        let mut cfg = self.load();
        cfg.activity_recognition_enabled = enabled;
        self.save(&cfg)
    }
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path =
            AppDirs::config_path().unwrap_or_else(|| PathBuf::from("stepeeeasy_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("config {} has bad values: {e}", self.path.display());
                match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                    Ok(fields) => recover_fields(&fields),
                    Err(_) => Config::default(),
                }
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

/// Keep every field that parses on its own; the rest take their defaults.
fn recover_fields(fields: &Map<String, Value>) -> Config {
    let mut cfg = Config::default();
    recover_field(fields, "height_cm", &mut cfg.height_cm);
    recover_field(
        fields,
        "activity_recognition_enabled",
        &mut cfg.activity_recognition_enabled,
    );
    recover_field(fields, "sensor", &mut cfg.sensor);
    recover_field(fields, "cadence_spm", &mut cfg.cadence_spm);
    recover_field(fields, "iio_poll_ms", &mut cfg.iio_poll_ms);
    cfg
}

fn recover_field<T: DeserializeOwned>(fields: &Map<String, Value>, name: &str, slot: &mut T) {
    let Some(value) = fields.get(name) else {
        return;
    };
    match serde_json::from_value(value.clone()) {
        Ok(v) => *slot = v,
        Err(e) => log::warn!("config field {name} reset to default: {e}"),
    }
}

/// The saved height, re-read from disk at every session start
impl HeightSource for FileConfigStore {
    fn height(&self) -> HeightCm {
        self.load().height_cm
    }
}
