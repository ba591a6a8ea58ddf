// src/run/registry.rs

//! Bookkeeping of live runs for a presentation layer.
//!
//! A [`Run`] does not know about other runs. Refusing to start a profile that
//! is already running is a policy of whoever launches runs; this registry is
//! that policy for the CLI.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::errors::{ProcpilotError, Result};

use super::orchestrator::Run;

pub type RunId = u64;

#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<BTreeMap<RunId, Arc<Run>>>,
    next_id: AtomicU64,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> MutexGuard<'_, BTreeMap<RunId, Arc<Run>>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether any registered run tagged `profile_name` is still running.
    pub fn is_profile_running(&self, profile_name: &str) -> bool {
        self.runs()
            .values()
            .any(|run| run.profile_name() == Some(profile_name) && run.is_running())
    }

    /// Register and start `run`.
    ///
    /// Refused with [`ProcpilotError::ProfileAlreadyRunning`] when another run
    /// of the same profile is live.
    pub fn launch(&self, run: Run) -> Result<RunId> {
        let mut runs = self.runs();

        if let Some(name) = run.profile_name() {
            let duplicate = runs
                .values()
                .any(|other| other.profile_name() == Some(name) && other.is_running());
            if duplicate {
                return Err(ProcpilotError::ProfileAlreadyRunning(name.to_string()));
            }
        }

        run.start()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!(run_id = id, profile = ?run.profile_name(), "run registered");
        runs.insert(id, Arc::new(run));
        Ok(id)
    }

    pub fn get(&self, id: RunId) -> Option<Arc<Run>> {
        self.runs().get(&id).cloned()
    }

    /// Ids of runs that are still running.
    pub fn active_ids(&self) -> Vec<RunId> {
        self.runs()
            .iter()
            .filter(|(_, run)| run.is_running())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Stop one run. Returns `false` for unknown ids.
    pub fn stop(&self, id: RunId) -> bool {
        match self.get(id) {
            Some(run) => {
                run.stop_all();
                true
            }
            None => false,
        }
    }

    /// Stop every running run; returns how many were running.
    pub fn stop_all_runs(&self) -> usize {
        let active: Vec<Arc<Run>> = self
            .runs()
            .values()
            .filter(|run| run.is_running())
            .cloned()
            .collect();

        for run in &active {
            run.stop_all();
        }
        active.len()
    }

    /// Forget finished runs; returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut runs = self.runs();
        let before = runs.len();
        runs.retain(|_, run| run.is_running());
        before - runs.len()
    }

    pub fn len(&self) -> usize {
        self.runs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs().is_empty()
    }
}
