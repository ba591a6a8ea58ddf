// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `procpilot`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procpilot",
    version,
    about = "Run groups of shell steps as process trees and manage listening ports.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the profile document (JSON).
    ///
    /// Default: `profiles.json` in the procpilot config directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub profiles: Option<PathBuf>,

    /// Path to the settings file (TOML).
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCPILOT_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List stored profiles and their steps.
    List,

    /// Run one or more profiles until they finish or Ctrl-C is pressed.
    Run {
        /// Profile names.
        #[arg(required = true, value_name = "PROFILE")]
        profiles: Vec<String>,

        /// Prefix each output line with its step label.
        #[arg(long)]
        prefix: bool,
    },

    /// Show sockets in a listening state and their owning processes.
    Ports {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Kill the process trees owning the given PIDs.
    Kill {
        #[arg(required = true, value_name = "PID")]
        pids: Vec<String>,
    },

    /// Add a profile, or replace the one with the same name.
    Add {
        name: String,

        /// Command to run; repeat for multiple steps.
        #[arg(long = "step", required = true, value_name = "COMMAND")]
        steps: Vec<String>,

        /// Labels, matched to steps by position.
        #[arg(long = "label", value_name = "LABEL")]
        labels: Vec<String>,

        /// Working directories, matched to steps by position.
        #[arg(long = "cwd", value_name = "DIR")]
        cwds: Vec<PathBuf>,
    },

    /// Delete a stored profile.
    Remove { name: String },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_collects_repeated_steps() {
        let args = CliArgs::try_parse_from([
            "procpilot", "add", "dev", "--step", "make", "--label", "build", "--step",
            "make test",
        ])
        .unwrap();

        match args.command {
            Command::Add { name, steps, labels, cwds } => {
                assert_eq!(name, "dev");
                assert_eq!(steps, vec!["make", "make test"]);
                assert_eq!(labels, vec!["build"]);
                assert!(cwds.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let args =
            CliArgs::try_parse_from(["procpilot", "list", "--profiles", "/tmp/p.json"]).unwrap();
        assert_eq!(args.profiles, Some(PathBuf::from("/tmp/p.json")));
    }

    #[test]
    fn run_requires_a_profile() {
        assert!(CliArgs::try_parse_from(["procpilot", "run"]).is_err());
    }
}
