//! Session configuration.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::InputShape;

/// Default artifact location, relative to the working directory.
pub const DEFAULT_MODEL_URI: &str = "models/covid-pneumonia/model.onnx";

/// Input size the published classifier was trained on.
pub const DEFAULT_INPUT_SIZE: usize = 200;

pub const DEFAULT_HISTORY_LIMIT: usize = 32;

/// Largest accepted input side length.
pub const MAX_INPUT_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// How decoded 8-bit intensities are fed to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelScale {
    /// 0–255, unnormalized.
    #[default]
    Raw,
    /// 0–1.
    Unit,
}

impl PixelScale {
    pub fn apply(&self, value: u8) -> f32 {
        match self {
            Self::Raw => value as f32,
            Self::Unit => value as f32 / 255.0,
        }
    }
}

impl FromStr for PixelScale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "unit" => Ok(Self::Unit),
            other => Err(ConfigError::Invalid(format!(
                "unknown pixel scale '{other}' (expected 'raw' or 'unit')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// URL, `file://` URI, or path of the ONNX artifact.
    pub model_uri: String,
    /// Side length of the square model input.
    pub input_size: usize,
    /// Maximum number of history entries; `None` keeps everything.
    pub history_limit: Option<usize>,
    pub pixel_scale: PixelScale,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_uri: DEFAULT_MODEL_URI.to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            history_limit: Some(DEFAULT_HISTORY_LIMIT),
            pixel_scale: PixelScale::Raw,
        }
    }
}

impl SessionConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_uri.trim().is_empty() {
            return Err(ConfigError::Invalid("model_uri must not be empty".into()));
        }
        if self.input_size == 0 {
            return Err(ConfigError::Invalid("input_size must be positive".into()));
        }
        if self.input_size > MAX_INPUT_SIZE {
            return Err(ConfigError::Invalid(format!(
                "input_size {} exceeds the maximum of {MAX_INPUT_SIZE}",
                self.input_size
            )));
        }
        if self.history_limit == Some(0) {
            return Err(ConfigError::Invalid(
                "history_limit must be positive (use null for unbounded)".into(),
            ));
        }
        Ok(())
    }

    pub fn input_shape(&self) -> InputShape {
        InputShape::square(self.input_size)
    }
}
