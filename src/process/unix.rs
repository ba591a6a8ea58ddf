// src/process/unix.rs

//! POSIX process groups via `setsid()` + `killpg()`.

use std::io::PipeReader;
use std::os::fd::OwnedFd;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{getpgid, setsid, Pid};
use tokio::net::unix::pipe;
use tokio::process::Command;
use tracing::debug;

use super::{GroupHandle, OutputPipe, Termination, TerminationError};

pub(super) fn shell_command(command: &str) -> Command {
    let mut c = Command::new("sh");
    c.arg("-c").arg(command);
    c
}

pub(super) fn detach(cmd: &mut Command) {
    // SAFETY: only the async-signal-safe `setsid` runs between fork and exec.
    unsafe {
        cmd.pre_exec(|| {
            setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }
}

/// Register the read end with the reactor; tokio switches it to
/// non-blocking mode.
pub(super) fn output_reader(reader: PipeReader) -> std::io::Result<OutputPipe> {
    let receiver = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
    Ok(Box::new(receiver))
}

/// A session leader's PGID equals its PID.
pub(super) fn own_group(pid: u32) -> GroupHandle {
    GroupHandle { pid, pgid: pid }
}

pub(super) fn lookup_group(pid: u32) -> Result<GroupHandle, TerminationError> {
    let target = to_pid(pid)?;

    let pgid = getpgid(Some(target)).map_err(|errno| TerminationError::Lookup {
        pid,
        source: errno.into(),
    })?;

    // Signalling our own group would take procpilot down with the target.
    let ours = getpgid(None).map_err(|errno| TerminationError::Lookup {
        pid,
        source: errno.into(),
    })?;
    if pgid == ours {
        return Err(TerminationError::OwnGroup { pid });
    }

    Ok(GroupHandle {
        pid,
        pgid: pgid.as_raw().unsigned_abs(),
    })
}

pub(super) fn terminate(handle: GroupHandle, mode: Termination) -> Result<(), TerminationError> {
    let signal = match mode {
        Termination::Graceful => Signal::SIGTERM,
        Termination::Forceful => Signal::SIGKILL,
    };
    let pgid = to_pid(handle.pgid)?;

    match killpg(pgid, signal) {
        Ok(()) => {
            debug!(pgid = handle.pgid, ?signal, "signalled process group");
            Ok(())
        }
        Err(Errno::ESRCH) => {
            debug!(pgid = handle.pgid, "process group already exited");
            Ok(())
        }
        Err(errno) => Err(TerminationError::Signal {
            pgid: handle.pgid,
            source: errno.into(),
        }),
    }
}

/// `killpg(0)` and `killpg(1)` address the caller's group and init; neither
/// is ever a valid target.
fn to_pid(raw: u32) -> Result<Pid, TerminationError> {
    match i32::try_from(raw) {
        Ok(value) if value > 1 => Ok(Pid::from_raw(value)),
        _ => Err(TerminationError::InvalidPid(raw)),
    }
}
