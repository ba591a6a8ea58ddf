// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod ports;
pub mod process;
pub mod run;

use std::io::Write;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{default_profiles_path, load_settings, Profile, ProfileStore, Settings, Step};
use crate::errors::ProcpilotError;
use crate::ports::{format_table, KillOutcome, PortInspector};
use crate::run::{Run, RunOptions, RunOutcome, RunRegistry};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings and profile store resolution
/// - one subcommand: listing/editing profiles, running profiles, or
///   inspecting/killing listening ports
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = load_settings(args.settings.as_deref())?;
    let store = ProfileStore::open(args.profiles.clone().unwrap_or_else(default_profiles_path));

    match args.command {
        Command::List => list_profiles(&store),
        Command::Run { profiles, prefix } => run_profiles(&store, &settings, &profiles, prefix).await,
        Command::Ports { json } => show_ports(&settings, json).await,
        Command::Kill { pids } => kill_pids(&settings, &pids),
        Command::Add {
            name,
            steps,
            labels,
            cwds,
        } => add_profile(&store, name, steps, labels, cwds),
        Command::Remove { name } => {
            store.remove(&name)?;
            println!("removed profile '{name}'");
            Ok(())
        }
    }
}

fn list_profiles(store: &ProfileStore) -> Result<()> {
    let profiles = store.load()?;
    if profiles.is_empty() {
        println!("no profiles in {:?}", store.path());
        return Ok(());
    }

    for profile in &profiles {
        println!("{} ({} steps)", profile.name, profile.steps.len());
        for (i, step) in profile.steps.iter().enumerate() {
            let mut line = format!("  {}. ", i + 1);
            if let Some(label) = &step.label {
                line.push_str(&format!("{label}: "));
            }
            line.push_str(&step.command);
            if let Some(dir) = &step.working_directory {
                line.push_str(&format!("  (in {})", dir.display()));
            }
            println!("{line}");
        }
    }
    Ok(())
}

fn add_profile(
    store: &ProfileStore,
    name: String,
    commands: Vec<String>,
    labels: Vec<String>,
    cwds: Vec<std::path::PathBuf>,
) -> Result<()> {
    let steps = commands
        .into_iter()
        .enumerate()
        .map(|(i, command)| {
            let mut step = Step::new(command);
            step.label = labels.get(i).cloned();
            step.working_directory = cwds.get(i).cloned();
            step
        })
        .collect();

    let saved = store.upsert(Profile::new(name, steps))?;
    println!(
        "saved profile '{}' with {} step(s)",
        saved.name,
        saved.steps.len()
    );
    Ok(())
}

/// Run the named profiles concurrently until all finish; Ctrl-C stops them.
async fn run_profiles(
    store: &ProfileStore,
    settings: &Settings,
    names: &[String],
    prefix: bool,
) -> Result<()> {
    let stored = store.load()?;

    // Resolve everything up front so a typo never leaves runs behind.
    let selected = names
        .iter()
        .map(|name| {
            stored
                .iter()
                .find(|p| &p.name == name)
                .cloned()
                .ok_or_else(|| ProcpilotError::ProfileNotFound(name.clone()))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut options = RunOptions::from(&settings.run);
    options.prefix_lines |= prefix;

    let registry = RunRegistry::new();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(String, RunOutcome)>();

    for profile in selected {
        let tx = done_tx.clone();
        let tag = profile.name.clone();
        let run = Run::new(
            profile.steps,
            print_line,
            Some(Box::new(move |outcome: RunOutcome| {
                let _ = tx.send((tag, outcome));
            })),
        )
        .with_profile_name(profile.name.as_str())
        .with_options(options.clone());

        match registry.launch(run) {
            Ok(id) => info!(run_id = id, profile = %profile.name, "profile started"),
            Err(ProcpilotError::ProfileAlreadyRunning(name)) => {
                warn!(profile = %name, "profile is already running; not starting it twice");
            }
            Err(e) => {
                registry.stop_all_runs();
                return Err(e.into());
            }
        }
    }
    drop(done_tx);

    let expected = registry.len();
    let mut finished = 0;
    let mut unsuccessful = Vec::new();
    let mut interrupted = false;

    while finished < expected {
        tokio::select! {
            done = done_rx.recv() => match done {
                Some((name, outcome)) => {
                    finished += 1;
                    if outcome != RunOutcome::Completed {
                        unsuccessful.push(format!("{name} ({outcome:?})"));
                    }
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    continue;
                }
                let stopped = registry.stop_all_runs();
                info!(stopped, "Ctrl+C received; stopping all runs");
            }
        }
    }

    if unsuccessful.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("not completed: {}", unsuccessful.join(", ")))
    }
}

fn print_line(line: &str) {
    let mut out = std::io::stdout().lock();
    // A closed stdout only loses output; the run itself carries on.
    let _ = writeln!(out, "{line}");
}

async fn show_ports(settings: &Settings, json: bool) -> Result<()> {
    let entries = PortInspector::from_settings(&settings.ports).enumerate().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("no listening ports found");
    } else {
        print!("{}", format_table(&entries));
    }
    Ok(())
}

fn kill_pids(settings: &Settings, pids: &[String]) -> Result<()> {
    let report = PortInspector::from_settings(&settings.ports).kill(pids);

    for (pid, outcome) in &report.results {
        match outcome {
            KillOutcome::Killed => println!("{pid}: killed"),
            KillOutcome::Skipped => println!("{pid}: skipped (not a pid)"),
            KillOutcome::Failed(reason) => println!("{pid}: failed: {reason}"),
        }
    }

    if report.has_failures() {
        return Err(anyhow!(
            "failed to kill {} process tree(s)",
            report.failures().count()
        ));
    }
    Ok(())
}
