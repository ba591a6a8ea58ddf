// src/process/windows.rs

//! Windows process groups via `CREATE_NEW_PROCESS_GROUP` + `taskkill /T /F`.

use std::io::PipeReader;
use std::os::windows::io::OwnedHandle;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::{GroupHandle, OutputPipe, Termination, TerminationError};

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

pub(super) fn shell_command(command: &str) -> Command {
    let mut c = Command::new("cmd");
    c.arg("/C").arg(command);
    c
}

pub(super) fn detach(cmd: &mut Command) {
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

/// Anonymous pipes cannot be registered with IOCP; reads go through tokio's
/// blocking pool instead.
pub(super) fn output_reader(reader: PipeReader) -> std::io::Result<OutputPipe> {
    let file = std::fs::File::from(OwnedHandle::from(reader));
    Ok(Box::new(tokio::fs::File::from_std(file)))
}

pub(super) fn own_group(pid: u32) -> GroupHandle {
    GroupHandle { pid, pgid: pid }
}

/// `taskkill /T` walks the tree from the PID itself.
pub(super) fn lookup_group(pid: u32) -> Result<GroupHandle, TerminationError> {
    if pid == 0 || pid == std::process::id() {
        return Err(TerminationError::InvalidPid(pid));
    }
    Ok(GroupHandle { pid, pgid: pid })
}

/// There is no graceful tree signal; both modes force-kill the tree.
pub(super) fn terminate(handle: GroupHandle, _mode: Termination) -> Result<(), TerminationError> {
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &handle.pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| TerminationError::TreeKill {
            pid: handle.pid,
            reason: e.to_string(),
        })?;

    if status.success() {
        debug!(pid = handle.pid, "taskkill terminated process tree");
        Ok(())
    } else {
        Err(TerminationError::TreeKill {
            pid: handle.pid,
            reason: format!("taskkill exited with {status}"),
        })
    }
}
