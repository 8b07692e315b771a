//! Configuration files for mailsplit
//!
//! Everything mailsplit persists lives under one directory
//! (`~/.config/mailsplit/`): the OAuth client credentials, optional
//! settings, and a `tokens/` subdirectory with one token file per account.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory under the platform config directory
const APP_DIR: &str = "mailsplit";

/// Initialize the mailsplit config directory.
///
/// Creates ~/.config/mailsplit/ if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Get the mailsplit config directory (~/.config/mailsplit/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a file or subdirectory within the config directory
pub fn config_path(name: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(name))
}

/// Check if a config file exists in the config directory
pub fn config_exists(name: &str) -> bool {
    config_path(name).is_some_and(|p| p.exists())
}

/// Load and parse a JSON config file from the config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load a JSON config file, or `T::default()` when it does not exist
pub fn load_json_or_default<T: DeserializeOwned + Default>(filename: &str) -> Result<T> {
    match config_path(filename) {
        Some(path) if path.exists() => load_json_file(&path),
        _ => Ok(T::default()),
    }
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Save a value as pretty JSON, creating parent directories as needed
pub fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Ensure a subdirectory of the config directory exists
pub fn ensure_config_subdir(name: &str) -> Result<PathBuf> {
    let dir = config_path(name).context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Delete a directory and everything in it
///
/// Returns `false` if there was nothing to delete.
pub fn remove_dir(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    Ok(true)
}
