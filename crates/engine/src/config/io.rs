//! Loading and saving client settings.

use std::env;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

use dirs_next::{config_dir, home_dir};
use tracing::debug;

use super::model::{ClientSettings, ConfigError};

/// Environment variable that overrides the client settings location.
pub const CLIENT_CONFIG_PATH_ENV: &str = "WAYPOINT_CLIENT_CONFIG";

/// Returns the default path for the client settings file.
pub fn default_settings_path() -> PathBuf {
    if let Ok(path) = env::var(CLIENT_CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("waypoint").join("client.json")
}

/// Loads client settings from the default path.
pub fn load_settings() -> Result<ClientSettings, ConfigError> {
    load_settings_from_path(&default_settings_path())
}

/// Loads client settings from `path`. A missing file yields empty settings.
///
/// Files ending in `.yaml` or `.yml` are read as YAML, everything else as JSON.
pub fn load_settings_from_path(path: &Path) -> Result<ClientSettings, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "client settings file not found, using defaults");
        return Ok(ClientSettings::default());
    }

    let content = fs::read_to_string(path)?;
    let settings = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(settings)
}

/// Saves client settings to `path`, creating parent directories as needed.
pub fn save_settings_to_path(settings: &ClientSettings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent_directory) = path.parent() {
        create_dir_all(parent_directory)?;
    }

    let content = if is_yaml(path) {
        serde_yaml::to_string(settings)?
    } else {
        serde_json::to_string_pretty(settings)?
    };
    fs::write(path, content)?;
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml"))
}

fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = trimmed.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(trimmed)
}
