// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::Settings;
use crate::config::validate::validate_settings;
use crate::errors::{ProcpilotError, Result};

/// Environment variable overriding the configuration directory.
pub const HOME_ENV: &str = "PROCPILOT_HOME";

const APP_DIR: &str = "procpilot";
const PROFILES_FILE: &str = "profiles.json";
const SETTINGS_FILE: &str = "settings.toml";

/// Directory holding `profiles.json` and `settings.toml`.
///
/// Resolution order:
/// 1. `PROCPILOT_HOME`
/// 2. the platform config dir (`~/.config/procpilot`, `%APPDATA%\procpilot`,
///    `~/Library/Application Support/procpilot`)
/// 3. `.procpilot` in the current working directory
pub fn config_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".procpilot"))
}

pub fn default_profiles_path() -> PathBuf {
    config_dir().join(PROFILES_FILE)
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join(SETTINGS_FILE)
}

/// Parse and validate a settings file.
pub fn load_settings_from_path(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let settings: Settings = toml::from_str(&contents)?;
    validate_settings(&settings)?;

    Ok(settings)
}

/// Load settings for the CLI.
///
/// An explicitly requested file must exist. The default location is optional:
/// when nothing is there, built-in defaults are used.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(ProcpilotError::ConfigError(format!(
                    "settings file {:?} does not exist",
                    path
                )));
            }
            load_settings_from_path(path)
        }
        None => {
            let path = default_settings_path();
            if path.is_file() {
                load_settings_from_path(&path)
            } else {
                debug!(path = ?path, "no settings file; using defaults");
                Ok(Settings::default())
            }
        }
    }
}
