// src/process/mod.rs

//! Detached process groups.
//!
//! Every step is launched as the root of its own process group so that the
//! whole tree it forks can later be signalled as a unit:
//!
//! - POSIX: the child calls `setsid()` before `exec`, becoming a session and
//!   group leader (PGID == PID). Termination signals the negated PGID.
//! - Windows: the child is created with `CREATE_NEW_PROCESS_GROUP` and the tree
//!   is torn down with `taskkill /T /F`.
//!
//! Callers only see the [`ProcessGroups`] capability; the platform branch
//! lives in [`unix`] / [`windows`].

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use unix as platform;
#[cfg(windows)]
use windows as platform;

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tracing::debug;

/// What to launch.
#[derive(Debug, Clone, Copy)]
pub struct LaunchSpec<'a> {
    /// Passed verbatim to `sh -c` / `cmd /C`.
    pub command: &'a str,
    pub working_directory: Option<&'a Path>,
}

/// PID plus the process-group id that addresses its whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle {
    pub pid: u32,
    pub pgid: u32,
}

/// Read end of the pipe a child writes both stdout and stderr into.
pub type OutputPipe = Box<dyn AsyncRead + Send + Unpin>;

/// A freshly launched group leader.
///
/// stdout and stderr share one pipe, read through `output`, so lines keep
/// the order the process wrote them in. stdin is closed.
pub struct DetachedChild {
    pub handle: GroupHandle,
    pub child: Child,
    pub output: OutputPipe,
}

impl fmt::Debug for DetachedChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachedChild")
            .field("handle", &self.handle)
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

/// How hard to hit a process tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `SIGTERM` on POSIX.
    Graceful,
    /// `SIGKILL` on POSIX.
    Forceful,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0}")]
    Spawn(#[from] std::io::Error),

    #[error("spawned process did not report a pid")]
    MissingPid,
}

#[derive(Debug, Error)]
pub enum TerminationError {
    #[error("pid {0} is not a valid process id")]
    InvalidPid(u32),

    #[error("process {pid} belongs to procpilot's own process group")]
    OwnGroup { pid: u32 },

    #[error("cannot resolve process group of {pid}: {source}")]
    Lookup {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal process group {pgid}: {source}")]
    Signal {
        pgid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("tree-kill utility failed for pid {pid}: {reason}")]
    TreeKill { pid: u32, reason: String },
}

/// Capability to launch detached process trees and tear them down again.
///
/// Production code uses [`NativeProcessGroups`]; tests can wrap or replace it
/// to observe launches and terminations.
pub trait ProcessGroups: Send + Sync + fmt::Debug {
    /// Launch `spec` through the platform shell as a new group leader.
    ///
    /// Must be called from within a tokio runtime.
    fn spawn_detached(&self, spec: &LaunchSpec<'_>) -> Result<DetachedChild, LaunchError>;

    /// Signal every process in the group rooted at `handle`.
    fn terminate_tree(
        &self,
        handle: GroupHandle,
        mode: Termination,
    ) -> Result<(), TerminationError>;

    /// Resolve the group of an arbitrary, not self-spawned PID.
    fn group_of(&self, pid: u32) -> Result<GroupHandle, TerminationError>;
}

/// The real, OS-backed implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProcessGroups;

impl ProcessGroups for NativeProcessGroups {
    fn spawn_detached(&self, spec: &LaunchSpec<'_>) -> Result<DetachedChild, LaunchError> {
        let mut cmd = platform::shell_command(spec.command);

        if let Some(dir) = spec.working_directory {
            cmd.current_dir(dir);
        }

        let (reader, writer) = std::io::pipe()?;
        let err_writer = writer.try_clone()?;
        let output = platform::output_reader(reader)?;

        cmd.stdin(Stdio::null())
            .stdout(writer)
            .stderr(err_writer)
            .kill_on_drop(false);

        platform::detach(&mut cmd);

        let child = cmd.spawn()?;
        // The command still owns our copies of the write end; EOF only
        // arrives once they are closed.
        drop(cmd);

        let pid = child.id().ok_or(LaunchError::MissingPid)?;
        let handle = platform::own_group(pid);

        debug!(pid = handle.pid, pgid = handle.pgid, command = %spec.command, "spawned detached process group");

        Ok(DetachedChild {
            handle,
            child,
            output,
        })
    }

    fn terminate_tree(
        &self,
        handle: GroupHandle,
        mode: Termination,
    ) -> Result<(), TerminationError> {
        platform::terminate(handle, mode)
    }

    fn group_of(&self, pid: u32) -> Result<GroupHandle, TerminationError> {
        platform::lookup_group(pid)
    }
}
