// src/core/paths.rs

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILENAME};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from locating the config directory or expanding a path template.
#[derive(Error, Debug)]
pub enum PathError {
    /// The platform reports no config directory for this user.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// The config directory exists in name only and could not be created.
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        /// The directory that was being created.
        path: String,
        /// Why creation failed.
        #[source]
        source: std::io::Error,
    },
    /// A `~` or `$VAR` in the template could not be resolved.
    #[error("Could not expand path '{template}': {reason}")]
    Expansion {
        /// The path as written.
        template: String,
        /// Why expansion failed.
        reason: String,
    },
}

/// Returns the shellwrap configuration directory (`~/.config/shellwrap` on Linux),
/// creating it if it doesn't exist.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    Ok(config_path)
}

/// Returns the path to the session `config.toml`.
pub fn get_config_file_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Expands `~` and `$VAR` / `${VAR}` in a path template.
///
/// # Errors
/// Fails when the template references an environment variable that is not set.
pub fn expand_path(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}
