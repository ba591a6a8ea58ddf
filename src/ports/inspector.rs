// src/ports/inspector.rs

use std::collections::BTreeSet;
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::model::PortSettings;
use crate::process::{NativeProcessGroups, ProcessGroups, Termination};

use super::model::PortEntry;
use super::parse_pid;
use super::parser::PortTableParser;
#[cfg(not(windows))]
use super::parser::{LinuxNetstat, Lsof};
#[cfg(windows)]
use super::parser::WindowsNetstat;

/// A socket-listing command paired with the parser for its output.
#[derive(Clone)]
pub struct EnumerationTool {
    pub program: String,
    pub args: Vec<String>,
    pub parser: Arc<dyn PortTableParser>,
}

impl EnumerationTool {
    pub fn new(program: &str, args: &[&str], parser: Arc<dyn PortTableParser>) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            parser,
        }
    }
}

impl fmt::Debug for EnumerationTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumerationTool")
            .field("program", &self.program)
            .field("args", &self.args)
            .finish()
    }
}

/// Tools tried in order on this platform.
#[cfg(windows)]
pub fn platform_tools() -> Vec<EnumerationTool> {
    vec![EnumerationTool::new("netstat", &["-ano"], Arc::new(WindowsNetstat))]
}

/// Tools tried in order on this platform.
///
/// BSD `netstat` has no `-p`, so on macOS the first entry fails and `lsof`
/// takes over.
#[cfg(not(windows))]
pub fn platform_tools() -> Vec<EnumerationTool> {
    vec![
        EnumerationTool::new("netstat", &["-tunlp"], Arc::new(LinuxNetstat)),
        EnumerationTool::new("lsof", &["-i", "-P", "-n"], Arc::new(Lsof)),
    ]
}

#[derive(Debug, Error)]
enum EnumerationError {
    #[error("{tool} is unavailable: {source}")]
    Unavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("{tool} exited with {status}")]
    Failed { tool: String, status: String },
}

/// Result of terminating one PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    Killed,
    /// Not a positive integer; nothing was attempted.
    Skipped,
    Failed(String),
}

/// Per-PID results of [`PortInspector::kill`], in ascending PID-string order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillReport {
    pub results: Vec<(String, KillOutcome)>,
}

impl KillReport {
    pub fn outcome(&self, pid: &str) -> Option<&KillOutcome> {
        self.results
            .iter()
            .find(|(p, _)| p == pid)
            .map(|(_, outcome)| outcome)
    }

    pub fn killed(&self) -> impl Iterator<Item = &str> {
        self.with(|o| matches!(o, KillOutcome::Killed))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.with(|o| matches!(o, KillOutcome::Skipped))
    }

    /// `(pid, reason)` for every failed termination.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|(pid, outcome)| match outcome {
            KillOutcome::Failed(reason) => Some((pid.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    fn with(&self, pred: impl Fn(&KillOutcome) -> bool) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(move |(_, outcome)| pred(outcome))
            .map(|(pid, _)| pid.as_str())
    }
}

/// Lists listening sockets and force-kills the process trees owning them.
///
/// Holds no state between calls: every [`enumerate`](Self::enumerate) runs
/// the tools afresh.
#[derive(Debug, Clone)]
pub struct PortInspector {
    tools: Vec<EnumerationTool>,
    timeout: Duration,
    groups: Arc<dyn ProcessGroups>,
}

impl Default for PortInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl PortInspector {
    pub fn new() -> Self {
        Self {
            tools: platform_tools(),
            timeout: PortSettings::default().timeout(),
            groups: Arc::new(NativeProcessGroups),
        }
    }

    pub fn from_settings(settings: &PortSettings) -> Self {
        Self::new().with_timeout(settings.timeout())
    }

    /// Upper bound for each tool invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tools(mut self, tools: Vec<EnumerationTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_process_groups(mut self, groups: Arc<dyn ProcessGroups>) -> Self {
        self.groups = groups;
        self
    }

    /// All sockets currently in a listening state.
    ///
    /// Tools are tried in order; the first one that runs successfully within
    /// the timeout wins. Never fails: when every tool is missing, errors out
    /// or times out, the result is empty.
    pub async fn enumerate(&self) -> Vec<PortEntry> {
        for tool in &self.tools {
            match run_tool(tool, self.timeout).await {
                Ok(output) => {
                    let entries = tool.parser.parse(&output);
                    debug!(tool = %tool.program, entries = entries.len(), "enumerated listening sockets");
                    return entries;
                }
                Err(e) => {
                    debug!(error = %e, "enumeration tool failed; trying next");
                }
            }
        }

        warn!("no socket enumeration tool succeeded; returning no entries");
        Vec::new()
    }

    /// Force-kill the process tree of every PID in `pids`.
    ///
    /// Values that are not positive integers are reported as
    /// [`KillOutcome::Skipped`]. Failures are collected, not raised; every PID
    /// is attempted. Re-run [`enumerate`](Self::enumerate) afterwards to see
    /// the new state.
    pub fn kill<I, S>(&self, pids: I) -> KillReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = pids.into_iter().map(|p| p.as_ref().to_string()).collect();

        let results = unique
            .into_iter()
            .map(|raw| {
                let outcome = match parse_pid(&raw) {
                    None => {
                        debug!(pid = %raw, "not a pid; skipping");
                        KillOutcome::Skipped
                    }
                    Some(pid) => self.kill_tree(pid),
                };
                (raw, outcome)
            })
            .collect();

        KillReport { results }
    }

    fn kill_tree(&self, pid: u32) -> KillOutcome {
        let result = self
            .groups
            .group_of(pid)
            .and_then(|handle| self.groups.terminate_tree(handle, Termination::Forceful));

        match result {
            Ok(()) => {
                info!(pid, "killed process tree");
                KillOutcome::Killed
            }
            Err(e) => {
                warn!(pid, error = %e, "failed to kill process tree");
                KillOutcome::Failed(e.to_string())
            }
        }
    }
}

async fn run_tool(tool: &EnumerationTool, limit: Duration) -> Result<String, EnumerationError> {
    let mut cmd = Command::new(&tool.program);
    cmd.args(&tool.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = match timeout(limit, cmd.output()).await {
        Err(_) => {
            return Err(EnumerationError::Timeout {
                tool: tool.program.clone(),
                timeout: limit,
            })
        }
        Ok(Err(source)) => {
            return Err(EnumerationError::Unavailable {
                tool: tool.program.clone(),
                source,
            })
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        return Err(EnumerationError::Failed {
            tool: tool.program.clone(),
            status: output.status.to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
