//! Parser configuration from tutorme.toml

use crate::segmenter::SegmenterOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up next to the input when no config is given
pub const CONFIG_FILE_NAME: &str = "tutorme.toml";

/// Where rewritten image sources point by default
pub const DEFAULT_IMAGE_PREFIX: &str = "static/img/tutorials/";

/// Top-level configuration from tutorme.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorMeConfig {
    /// Segmentation behaviour
    pub segmenter: SegmenterOptions,

    /// Input adapter behaviour
    pub source: SourceOptions,
}

/// Options shared by the input adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Prefix that replaces the directory part of every image source
    pub image_prefix: String,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
        }
    }
}

impl TutorMeConfig {
    /// Load configuration from a tutorme.toml file
    ///
    /// # Parameters
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(TutorMeConfig)` - Successfully loaded configuration
    /// * `Err(ConfigError)` - Error reading or parsing the configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(ConfigError::IoError)?;

        let config: TutorMeConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        Ok(config)
    }

    /// Save configuration to a tutorme.toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        fs::write(&path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// Resolve the configuration for an input file
    ///
    /// An explicit path must exist. Otherwise a tutorme.toml next to the
    /// input is used when present, and the defaults when it is not.
    pub fn discover(explicit: Option<&Path>, input: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            log::info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        let candidate = sibling_config_path(input);
        if candidate.is_file() {
            log::info!("Loading config from {}", candidate.display());
            Self::load(&candidate)
        } else {
            log::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
            Ok(Self::default())
        }
    }
}

fn sibling_config_path(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CONFIG_FILE_NAME)
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum ConfigError {
    /// IO error when reading or writing file
    IoError(std::io::Error),

    /// Error parsing TOML
    ParseError(toml::de::Error),

    /// Error serializing to TOML
    SerializeError(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "TOML serialize error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
