use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ingest::IngestOptions,
    playback::Rate,
    text::{FilterConfig, JoinPolicy},
    voices::{default_preferences, VoicePreference},
};

pub const DEFAULT_RATE: f32 = 0.95;
pub const DEFAULT_PITCH: f32 = 0.85;
const PITCH_RANGE: (f32, f32) = (0.0, 2.0);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config JSON {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}

/// Root of bundled runtime assets, `READER_RUNTIME_DIR` or `runtime`.
pub fn runtime_dir() -> PathBuf {
    std::env::var_os("READER_RUNTIME_DIR")
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("runtime"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub filter: FilterConfig,
    pub join: JoinPolicy,
    pub skip_first_page: bool,
    pub rate: Rate,
    pub pitch: f32,
    pub voice_preferences: Vec<VoicePreference>,
    pub voices_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            join: JoinPolicy::default(),
            skip_first_page: true,
            rate: Rate::new(DEFAULT_RATE),
            pitch: DEFAULT_PITCH,
            voice_preferences: default_preferences(),
            voices_dir: None,
            output_dir: None,
        }
    }
}

impl ReaderConfig {
    /// Parses `path`, or returns defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let config = serde_json::from_str(&data)
            .map_err(|err| ConfigError::Parse(path.to_path_buf(), err))?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `READER_CONFIG` (default `<runtime>/reader.json`) and applies the
    /// `READER_VOICES_DIR` / `READER_OUTPUT_DIR` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Like [`ReaderConfig::from_env`], reading `path` instead of `READER_CONFIG`
    /// when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var_os("READER_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| runtime_dir().join("reader.json"))
        });
        let mut config = Self::load_or_default(&path)?;
        if let Some(dir) = std::env::var_os("READER_VOICES_DIR") {
            config.voices_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = std::env::var_os("READER_OUTPUT_DIR") {
            config.output_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    pub fn voices_dir(&self) -> PathBuf {
        self.voices_dir
            .clone()
            .unwrap_or_else(|| runtime_dir().join("voices"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| runtime_dir().join("output"))
    }

    pub fn pitch(&self) -> f32 {
        if self.pitch.is_finite() {
            self.pitch.clamp(PITCH_RANGE.0, PITCH_RANGE.1)
        } else {
            DEFAULT_PITCH
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            filter: self.filter.clone(),
            join: self.join,
            skip_first_page: self.skip_first_page,
        }
    }
}
