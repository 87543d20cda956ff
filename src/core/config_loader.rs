//! # Config Loader
//!
//! Reads the session configuration from `config.toml`. On first use the file does not
//! exist yet; the defaults are written there so users have something to edit.

use crate::{
    core::paths::{self, PathError},
    models::SessionConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading or writing the session config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("Filesystem Error on '{path}': {source}")]
    Io {
        /// The config file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid session config TOML.
    #[error("Failed to parse '{path}': {source}")]
    TomlParse {
        /// The config file.
        path: PathBuf,
        /// The parser's error, with line and column.
        #[source]
        source: toml::de::Error,
    },
    /// The default config could not be rendered as TOML.
    #[error("Failed to serialize session config to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// The config directory could not be located or created.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Loads the configuration from the default location in the user's config directory.
pub fn load_config() -> Result<SessionConfig, ConfigError> {
    let path = paths::get_config_file_path()?;
    load_config_from(&path)
}

/// Loads the configuration from `path`, creating it with default values if absent.
pub fn load_config_from(path: &Path) -> Result<SessionConfig, ConfigError> {
    if !path.exists() {
        let default_config = SessionConfig::default();
        let toml_string = toml::to_string_pretty(&default_config)?;
        fs::write(path, toml_string).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Default session config written to '{}'", path.display());
        return Ok(default_config);
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Session config loaded from '{}'", path.display());
    Ok(config)
}
