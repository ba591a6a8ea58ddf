use std::fmt;
use std::io;
use std::sync::Mutex;

use procpilot::process::{
    DetachedChild, GroupHandle, LaunchError, LaunchSpec, NativeProcessGroups, ProcessGroups,
    Termination, TerminationError,
};

/// Real process groups that also record what was asked of them.
///
/// Optionally refuses to launch one command, to exercise launch failures
/// without depending on what the host shell does, or runs a hook right
/// before each launch.
#[derive(Default)]
pub struct RecordingGroups {
    inner: NativeProcessGroups,
    fail_on: Option<String>,
    before_launch: Option<Box<dyn Fn(&str) + Send + Sync>>,
    launched: Mutex<Vec<String>>,
    terminated: Mutex<Vec<(GroupHandle, Termination)>>,
    lookups: Mutex<Vec<u32>>,
}

impl RecordingGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launching exactly `command` fails with `NotFound`.
    pub fn failing_on(command: &str) -> Self {
        Self {
            fail_on: Some(command.to_string()),
            ..Self::default()
        }
    }

    /// Call `hook` with the command before each launch is delegated.
    pub fn before_launch<H>(hook: H) -> Self
    where
        H: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            before_launch: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    /// Commands whose launch was attempted, in order.
    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    pub fn terminated(&self) -> Vec<(GroupHandle, Termination)> {
        self.terminated.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> Vec<u32> {
        self.lookups.lock().unwrap().clone()
    }
}

impl fmt::Debug for RecordingGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingGroups")
            .field("fail_on", &self.fail_on)
            .field("launched", &self.launched)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

impl ProcessGroups for RecordingGroups {
    fn spawn_detached(&self, spec: &LaunchSpec<'_>) -> Result<DetachedChild, LaunchError> {
        self.launched.lock().unwrap().push(spec.command.to_string());

        if let Some(hook) = &self.before_launch {
            hook(spec.command);
        }

        if self.fail_on.as_deref() == Some(spec.command) {
            return Err(LaunchError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                "simulated launch failure",
            )));
        }
        self.inner.spawn_detached(spec)
    }

    fn terminate_tree(
        &self,
        handle: GroupHandle,
        mode: Termination,
    ) -> Result<(), TerminationError> {
        self.terminated.lock().unwrap().push((handle, mode));
        self.inner.terminate_tree(handle, mode)
    }

    fn group_of(&self, pid: u32) -> Result<GroupHandle, TerminationError> {
        self.lookups.lock().unwrap().push(pid);
        self.inner.group_of(pid)
    }
}
