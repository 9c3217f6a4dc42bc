//! Configuration module for the vector index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`sercha.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SERCHA_` and use double
//! underscores to separate nested levels:
//! - `SERCHA_VECTOR_INDEX__DIMENSIONS=384` sets `vector_index.dimensions`
//! - `SERCHA_VECTOR_INDEX__PRECISION=int8` sets `vector_index.precision`
//! - `SERCHA_LOGGING__LEVEL=debug` sets `logging.level`

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::vector::{DEFAULT_CAPACITY, Precision};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sercha.toml";

/// Prefix of environment overrides.
const ENV_PREFIX: &str = "SERCHA_";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Settings {
    /// Vector index settings
    #[serde(default)]
    pub vector_index: VectorIndexSettings,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VectorIndexSettings {
    /// Directory holding the index files
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Embedding dimension (768 matches nomic-embed-text)
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// On-disk vector precision for new indexes
    #[serde(default)]
    pub precision: Precision,

    /// Initial slot budget for new indexes
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level filter, e.g. "info" or "sercha_vector=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".sercha/vectors")
}
fn default_dimensions() -> usize {
    768
}
fn default_initial_capacity() -> u64 {
    DEFAULT_CAPACITY
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for VectorIndexSettings {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            dimensions: default_dimensions(),
            precision: Precision::default(),
            initial_capacity: default_initial_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl VectorIndexSettings {
    /// Rejects settings no index can be built from.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.path.as_os_str().is_empty() {
            return Err(SearchError::Config {
                reason: "vector_index.path cannot be empty".to_string(),
            });
        }
        if self.dimensions == 0 {
            return Err(SearchError::Config {
                reason: "vector_index.dimensions must be greater than zero".to_string(),
            });
        }
        if self.initial_capacity == 0 {
            return Err(SearchError::Config {
                reason: "vector_index.initial_capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path))
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}
