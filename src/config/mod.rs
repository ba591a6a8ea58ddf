// src/config/mod.rs

//! Profiles and settings for procpilot.
//!
//! Responsibilities:
//! - Define the JSON profile model and the TOML settings model (`model.rs`).
//! - Resolve default locations and load settings (`loader.rs`).
//! - Normalize profiles and check settings invariants (`validate.rs`).
//! - Persist profiles (`store.rs`).

pub mod loader;
pub mod model;
pub mod store;
pub mod validate;

pub use loader::{config_dir, default_profiles_path, load_settings, load_settings_from_path};
pub use model::{PortSettings, Profile, ProfileDocument, RunSettings, Settings, Step};
pub use store::ProfileStore;
pub use validate::{normalize_profile, validate_settings};
