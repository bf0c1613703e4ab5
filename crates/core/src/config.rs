use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::recognition::infrastructure::directory_loader::ProfileLayout;
use crate::shared::constants::{
    DEFAULT_CHANGE_RATIO, DEFAULT_INTENSITY_THRESHOLD, DEFAULT_MATCH_THRESHOLD,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_SMOOTHING,
};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorSection,
    #[serde(default)]
    pub recognition: RecognitionSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorSection {
    #[serde(default = "default_intensity_threshold")]
    pub intensity_threshold: f64,
    #[serde(default = "default_change_ratio")]
    pub change_ratio: f64,
    #[serde(default = "default_smoothing")]
    pub smoothing: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionSection {
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,
    #[serde(default)]
    pub layout: ProfileLayout,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    /// Directory searched for model files before the cache and download.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            intensity_threshold: default_intensity_threshold(),
            change_ratio: default_change_ratio(),
            smoothing: default_smoothing(),
        }
    }
}

impl Default for RecognitionSection {
    fn default() -> Self {
        Self {
            profiles_dir: default_profiles_dir(),
            layout: ProfileLayout::default(),
            match_threshold: default_match_threshold(),
            models_dir: None,
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_intensity_threshold() -> f64 {
    DEFAULT_INTENSITY_THRESHOLD
}
fn default_change_ratio() -> f64 {
    DEFAULT_CHANGE_RATIO
}
fn default_smoothing() -> usize {
    DEFAULT_SMOOTHING
}
fn default_profiles_dir() -> PathBuf {
    PathBuf::from("profiles")
}
fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}
fn default_port() -> u16 {
    5000
}
fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}
fn default_log_level() -> String {
    "info".into()
}
