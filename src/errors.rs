// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Process-level failures (launching a step, signalling a group) have their
//! own error types in [`crate::process`]; they are converted into output
//! lines or per-PID report entries and never surface through this enum.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcpilotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid profile: {0}")]
    ProfileError(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Profile already running: {0}")]
    ProfileAlreadyRunning(String),

    #[error("no tokio runtime available to drive the run")]
    NoRuntime,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ProcpilotError>;
