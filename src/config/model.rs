// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// A single command of a profile, executed as one OS process.
///
/// Persisted as:
///
/// ```json
/// { "label": "build", "command": "make", "cwd": "/src/project" }
/// ```
///
/// Blank `label` / `cwd` values are read as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub label: Option<String>,

    /// Opaque command line handed to the platform shell.
    pub command: String,

    #[serde(rename = "cwd", default, deserialize_with = "blank_path_as_none")]
    pub working_directory: Option<PathBuf>,
}

impl Step {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            label: None,
            command: command.into(),
            working_directory: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Label shown in step headers; falls back to the raw command.
    pub fn display_label(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.command,
        }
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }
}

/// A named, ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Profile {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

/// Top-level JSON document holding every stored profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDocument {
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Settings as read from `settings.toml`.
///
/// ```toml
/// [run]
/// launch_delay_ms = 100
/// poll_interval_ms = 100
/// prefix_lines = false
///
/// [ports]
/// timeout_ms = 5000
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub run: RunSettings,

    #[serde(default)]
    pub ports: PortSettings,
}

/// `[run]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunSettings {
    /// Pause after each launch so near-simultaneous startup banners are less
    /// likely to interleave.
    #[serde(default = "default_launch_delay_ms")]
    pub launch_delay_ms: u64,

    /// How often the run checks whether every launched process has exited.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Prefix every forwarded output line with `[<step label>] `.
    #[serde(default)]
    pub prefix_lines: bool,
}

fn default_launch_delay_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            launch_delay_ms: default_launch_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            prefix_lines: false,
        }
    }
}

/// `[ports]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortSettings {
    /// Upper bound for each enumeration tool invocation.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl PortSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn blank_path_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(blank_as_none(deserializer)?.map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_label_and_cwd_are_absent() {
        let step: Step =
            serde_json::from_str(r#"{"label": "", "command": "make", "cwd": "  "}"#).unwrap();
        assert_eq!(step.label, None);
        assert_eq!(step.working_directory, None);
        assert_eq!(step.display_label(), "make");
    }

    #[test]
    fn null_and_missing_optional_fields_are_accepted() {
        let step: Step = serde_json::from_str(r#"{"command": "ls", "cwd": null}"#).unwrap();
        assert_eq!(step, Step::new("ls"));
    }

    #[test]
    fn settings_sections_default_independently() {
        let settings: Settings = toml::from_str("[run]\nprefix_lines = true\n").unwrap();
        assert!(settings.run.prefix_lines);
        assert_eq!(settings.run.launch_delay_ms, 100);
        assert_eq!(settings.ports.timeout(), Duration::from_secs(5));
    }
}
