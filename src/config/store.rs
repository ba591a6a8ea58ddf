// src/config/store.rs

//! JSON-backed profile persistence.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{Profile, ProfileDocument};
use crate::config::validate::normalize_profile;
use crate::errors::{ProcpilotError, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// Reads and writes the `{ "profiles": [...] }` document.
///
/// Every mutation rewrites the whole document.
#[derive(Debug, Clone)]
pub struct ProfileStore<F: FileSystem = RealFileSystem> {
    fs: F,
    path: PathBuf,
}

impl ProfileStore<RealFileSystem> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(RealFileSystem, path)
    }
}

impl<F: FileSystem> ProfileStore<F> {
    pub fn with_fs(fs: F, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all profiles. A missing document is created empty.
    pub fn load(&self) -> Result<Vec<Profile>> {
        if !self.fs.is_file(&self.path) {
            debug!(path = ?self.path, "profile document missing; creating empty one");
            self.write_document(&ProfileDocument::default())?;
            return Ok(Vec::new());
        }

        let contents = self.fs.read_to_string(&self.path)?;
        let document: ProfileDocument = serde_json::from_str(&contents)?;
        Ok(document.profiles)
    }

    /// Overwrite the document with `profiles`.
    pub fn save(&self, profiles: &[Profile]) -> Result<()> {
        let document = ProfileDocument {
            profiles: profiles.to_vec(),
        };
        self.write_document(&document)
    }

    pub fn get(&self, name: &str) -> Result<Profile> {
        self.load()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ProcpilotError::ProfileNotFound(name.to_string()))
    }

    /// Insert `profile`, replacing any stored profile with the same name.
    ///
    /// Returns the normalized profile that was stored.
    pub fn upsert(&self, profile: Profile) -> Result<Profile> {
        let profile = normalize_profile(profile)?;
        let mut profiles = self.load()?;

        match profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }

        self.save(&profiles)?;
        info!(profile = %profile.name, steps = profile.steps.len(), "profile saved");
        Ok(profile)
    }

    /// Delete the profile called `name`.
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut profiles = self.load()?;
        let before = profiles.len();
        profiles.retain(|p| p.name != name);

        if profiles.len() == before {
            return Err(ProcpilotError::ProfileNotFound(name.to_string()));
        }

        self.save(&profiles)?;
        info!(profile = %name, "profile removed");
        Ok(())
    }

    fn write_document(&self, document: &ProfileDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        self.fs.write(&self.path, json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::Step;
    use crate::fs::mock::MockFileSystem;

    const PATH: &str = "/cfg/profiles.json";

    fn store() -> (MockFileSystem, ProfileStore<MockFileSystem>) {
        let fs = MockFileSystem::new();
        let store = ProfileStore::with_fs(fs.clone(), PATH);
        (fs, store)
    }

    #[test]
    fn load_creates_empty_document_when_missing() {
        let (fs, store) = store();

        assert!(store.load().unwrap().is_empty());

        let written = fs.contents(PATH).expect("document should be created");
        let doc: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(doc["profiles"], serde_json::json!([]));
    }

    #[test]
    fn load_reads_existing_profiles() {
        let (fs, store) = store();
        fs.add_file(
            PATH,
            r#"{"profiles": [{"name": "dev", "steps": [{"label": "api", "command": "cargo run", "cwd": null}]}]}"#,
        );

        let profiles = store.load().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].steps[0].display_label(), "api");
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn document_without_profiles_key_is_empty() {
        let (fs, store) = store();
        fs.add_file(PATH, "{}");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_by_name_and_keeps_order() {
        let (_fs, store) = store();
        store
            .upsert(Profile::new("a", vec![Step::new("echo 1")]))
            .unwrap();
        store
            .upsert(Profile::new("b", vec![Step::new("echo 2")]))
            .unwrap();
        store
            .upsert(Profile::new("a", vec![Step::new("echo 3")]))
            .unwrap();

        let profiles = store.load().unwrap();
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(profiles[0].steps[0].command, "echo 3");
    }

    #[test]
    fn remove_unknown_profile_is_not_found() {
        let (_fs, store) = store();
        let err = store.remove("ghost").unwrap_err();
        assert!(matches!(err, ProcpilotError::ProfileNotFound(name) if name == "ghost"));
    }

    #[test]
    fn corrupt_document_is_a_json_error() {
        let (fs, store) = store();
        fs.add_file(PATH, "{not json");
        assert!(matches!(store.load(), Err(ProcpilotError::JsonError(_))));
    }
}
