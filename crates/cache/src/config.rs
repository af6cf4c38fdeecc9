//! Cache configuration for user-configurable budget ceilings
//!
//! Ceilings can come from a TOML file, environment variables, or be built
//! programmatically. Missing keys keep their defaults, so partial files and
//! partial environments are fine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for a [`ResourceCache`](crate::ResourceCache) instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// GPU memory budget ceiling in bytes
    pub max_bytes: usize,
    /// Budgeted resource count ceiling
    pub max_resources: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024, // 256 MB
            max_resources: 4096,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with the byte ceiling given in megabytes.
    pub fn new(max_mb: usize, max_resources: usize) -> Self {
        Self {
            max_bytes: max_mb * 1024 * 1024,
            max_resources,
        }
    }

    /// Sets the byte ceiling in megabytes.
    pub fn with_max_mb(mut self, mb: usize) -> Self {
        self.max_bytes = mb * 1024 * 1024;
        self
    }

    /// Sets the resource count ceiling.
    pub fn with_max_resources(mut self, count: usize) -> Self {
        self.max_resources = count;
        self
    }

    /// Returns the byte ceiling in megabytes.
    pub fn max_mb(&self) -> usize {
        self.max_bytes / (1024 * 1024)
    }

    /// Loads configuration from environment variables.
    ///
    /// - `GLAZE_CACHE_MB`: byte ceiling in megabytes (default: 256)
    /// - `GLAZE_CACHE_MAX_RESOURCES`: resource count ceiling (default: 4096)
    ///
    /// # Errors
    /// Returns an error if a variable is present but not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GLAZE_CACHE_MB") {
            let mb: usize = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GLAZE_CACHE_MB".to_string()))?;
            config.max_bytes = mb * 1024 * 1024;
        }

        if let Ok(val) = std::env::var("GLAZE_CACHE_MAX_RESOURCES") {
            config.max_resources = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GLAZE_CACHE_MAX_RESOURCES".to_string()))?;
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected format (both keys optional):
    /// ```toml
    /// max_cache_mb = 256
    /// max_resources = 4096
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(toml_str)?;
        let defaults = Self::default();
        Ok(Self {
            max_bytes: file
                .max_cache_mb
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.max_bytes),
            max_resources: file.max_resources.unwrap_or(defaults.max_resources),
        })
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let file = ConfigFile {
            max_cache_mb: Some(self.max_mb()),
            max_resources: Some(self.max_resources),
        };
        let toml = toml::to_string_pretty(&file)?;
        fs::write(path.as_ref(), toml)?;
        Ok(())
    }
}

/// On-disk representation; all keys optional so partial files work.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    max_cache_mb: Option<usize>,
    max_resources: Option<usize>,
}

/// Errors that can occur while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
