// src/config/validate.rs

use crate::config::model::{Profile, Settings, Step};
use crate::errors::{ProcpilotError, Result};

/// Clean up a profile before it is stored.
///
/// - the name is trimmed and must not be empty,
/// - steps whose command is blank are dropped,
/// - labels and working directories are trimmed; blanks become absent,
/// - at least one step must remain.
pub fn normalize_profile(profile: Profile) -> Result<Profile> {
    let name = profile.name.trim().to_string();
    ensure_has_name(&name)?;

    let steps: Vec<Step> = profile.steps.into_iter().filter_map(normalize_step).collect();
    ensure_has_steps(&name, &steps)?;

    Ok(Profile { name, steps })
}

fn normalize_step(step: Step) -> Option<Step> {
    // Commands are opaque; only a blank one is dropped.
    if step.command.trim().is_empty() {
        return None;
    }

    let label = step
        .label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    let working_directory = step
        .working_directory
        .map(|p| p.to_string_lossy().trim().to_string())
        .filter(|p| !p.is_empty())
        .map(Into::into);

    Some(Step {
        label,
        command: step.command,
        working_directory,
    })
}

fn ensure_has_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ProcpilotError::ProfileError(
            "profile name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn ensure_has_steps(name: &str, steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        return Err(ProcpilotError::ProfileError(format!(
            "profile '{}' must specify at least one command",
            name
        )));
    }
    Ok(())
}

/// Check settings invariants that `serde` defaults cannot express.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.run.poll_interval_ms == 0 {
        return Err(ProcpilotError::ConfigError(
            "[run].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if settings.ports.timeout_ms == 0 {
        return Err(ProcpilotError::ConfigError(
            "[ports].timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn blank_commands_are_dropped_and_fields_trimmed() {
        let profile = Profile::new(
            "  web  ",
            vec![
                Step::new("   "),
                Step::new(" npm start ")
                    .with_label("  ")
                    .with_working_directory(" /srv/app "),
            ],
        );

        let cleaned = normalize_profile(profile).unwrap();
        assert_eq!(cleaned.name, "web");
        assert_eq!(cleaned.steps.len(), 1);
        assert_eq!(cleaned.steps[0].command, " npm start ");
        assert_eq!(cleaned.steps[0].label, None);
        assert_eq!(
            cleaned.steps[0].working_directory,
            Some(PathBuf::from("/srv/app"))
        );
    }

    #[test]
    fn commands_are_stored_verbatim() {
        let command = "  printf '%s\\n' \"a  b\"  ";
        let cleaned =
            normalize_profile(Profile::new("raw", vec![Step::new(command)])).unwrap();
        assert_eq!(cleaned.steps[0].command, command);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = normalize_profile(Profile::new(" ", vec![Step::new("ls")])).unwrap_err();
        assert!(matches!(err, ProcpilotError::ProfileError(msg) if msg.contains("name")));
    }

    #[test]
    fn profile_without_commands_is_rejected() {
        let err = normalize_profile(Profile::new("empty", vec![Step::new("")])).unwrap_err();
        assert!(matches!(err, ProcpilotError::ProfileError(msg) if msg.contains("at least one")));
    }

    #[test]
    fn zero_poll_interval_is_a_config_error() {
        let mut settings = Settings::default();
        settings.run.poll_interval_ms = 0;
        assert!(matches!(
            validate_settings(&settings),
            Err(ProcpilotError::ConfigError(_))
        ));
    }
}
