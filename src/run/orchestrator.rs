// src/run/orchestrator.rs

//! One execution of a profile's step list.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::process::Child;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::model::{RunSettings, Step};
use crate::errors::{ProcpilotError, Result};
use crate::process::{
    DetachedChild, GroupHandle, LaunchSpec, NativeProcessGroups, ProcessGroups, Termination,
};

use super::sink::{ChannelSink, FinishCallback, FinishSlot, OutputSink, RunEvent, RunOutcome};
use super::stream::forward_output;
use super::token::RunToken;

const RULE_WIDTH: usize = 80;

/// Timing knobs for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Pause after each successful launch. Purely cosmetic: it makes startup
    /// banners of consecutive steps less likely to interleave.
    pub launch_delay: Duration,
    /// Exit-check interval while waiting for launched processes.
    pub poll_interval: Duration,
    /// After a natural finish, how long to wait for pipes still held open by
    /// stray descendants before the closing banner.
    pub drain_timeout: Duration,
    /// Prefix each forwarded line with `[<step label>] `.
    pub prefix_lines: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&RunSettings::default())
    }
}

impl From<&RunSettings> for RunOptions {
    fn from(settings: &RunSettings) -> Self {
        Self {
            launch_delay: Duration::from_millis(settings.launch_delay_ms),
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            drain_timeout: Duration::from_millis(500),
            prefix_lines: settings.prefix_lines,
        }
    }
}

/// Lifecycle of a run. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Stopped,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => RunState::Idle,
            1 => RunState::Running,
            2 => RunState::Completed,
            _ => RunState::Stopped,
        }
    }
}

struct TrackedProcess {
    handle: GroupHandle,
    child: Child,
}

/// State shared between the caller-facing [`Run`] and its background tasks.
struct RunCore {
    token: RunToken,
    state: AtomicU8,
    current_step: AtomicUsize,
    processes: Mutex<Vec<TrackedProcess>>,
    sink: Arc<dyn OutputSink>,
    finish: FinishSlot,
    groups: Arc<dyn ProcessGroups>,
}

impl RunCore {
    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: RunState, to: RunState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn processes(&self) -> MutexGuard<'_, Vec<TrackedProcess>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, line: &str) {
        self.sink.emit(line);
    }

    /// Record a launched process unless the run was stopped meanwhile.
    ///
    /// The token is re-checked under the lock `stop_all` takes after lowering
    /// it, so a concurrent stop either sees this process or we see the stop.
    fn track(&self, handle: GroupHandle, child: Child) -> bool {
        let mut processes = self.processes();
        if !self.token.is_running() {
            return false;
        }
        processes.push(TrackedProcess { handle, child });
        true
    }

    fn all_exited(&self) -> bool {
        self.processes()
            .iter_mut()
            .all(|p| !matches!(p.child.try_wait(), Ok(None)))
    }

    fn terminate_all(&self) {
        let processes = std::mem::take(&mut *self.processes());
        for p in &processes {
            if let Err(e) = self.groups.terminate_tree(p.handle, Termination::Graceful) {
                warn!(pid = p.handle.pid, pgid = p.handle.pgid, error = %e, "failed to terminate process group");
            }
        }
    }

    fn release(&self) {
        self.processes().clear();
    }
}

/// One execution instance of a profile's steps.
///
/// Every step is launched as its own detached process group, in list order,
/// with its output streamed to the sink as it arrives. [`Run::stop_all`]
/// terminates each group, descendants included.
///
/// A `Run` executes at most once: `idle → running → completed | stopped`.
pub struct Run {
    profile_name: Option<String>,
    steps: Arc<[Step]>,
    options: RunOptions,
    runtime: Option<Handle>,
    core: Arc<RunCore>,
}

impl Run {
    /// Create a run delivering output lines to `on_output` and signalling
    /// completion to `on_finish` (exactly once, if supplied).
    pub fn new<O>(steps: Vec<Step>, on_output: O, on_finish: Option<FinishCallback>) -> Self
    where
        O: Fn(&str) + Send + Sync + 'static,
    {
        Self::build(steps, Arc::new(on_output), on_finish)
    }

    pub fn with_sink(
        steps: Vec<Step>,
        sink: Arc<dyn OutputSink>,
        on_finish: Option<FinishCallback>,
    ) -> Self {
        Self::build(steps, sink, on_finish)
    }

    /// A run reporting everything, finish included, as [`RunEvent`]s.
    pub fn with_channel(steps: Vec<Step>) -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        let finish = sink.finish_callback();
        (Self::build(steps, Arc::new(sink), Some(finish)), rx)
    }

    fn build(
        steps: Vec<Step>,
        sink: Arc<dyn OutputSink>,
        on_finish: Option<FinishCallback>,
    ) -> Self {
        Self {
            profile_name: None,
            steps: steps.into(),
            options: RunOptions::default(),
            runtime: None,
            core: Arc::new(RunCore {
                token: RunToken::new(),
                state: AtomicU8::new(RunState::Idle as u8),
                current_step: AtomicUsize::new(0),
                processes: Mutex::new(Vec::new()),
                sink,
                finish: FinishSlot::new(on_finish),
                groups: Arc::new(NativeProcessGroups),
            }),
        }
    }

    /// Bookkeeping tag for the caller; never interpreted by the run.
    pub fn with_profile_name(mut self, name: impl Into<String>) -> Self {
        self.profile_name = Some(name.into());
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Drive the run on `handle` instead of the ambient runtime, for callers
    /// living on a non-tokio thread.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Replace the process-group capability (tests).
    ///
    /// Only effective before [`Run::start`].
    pub fn with_process_groups(mut self, groups: Arc<dyn ProcessGroups>) -> Self {
        if let Some(core) = Arc::get_mut(&mut self.core) {
            core.groups = groups;
        }
        self
    }

    pub fn profile_name(&self) -> Option<&str> {
        self.profile_name.as_deref()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_running(&self) -> bool {
        self.core.token.is_running()
    }

    pub fn state(&self) -> RunState {
        self.core.state()
    }

    /// 1-based index of the most recently attempted step; 0 before the first.
    pub fn current_step(&self) -> usize {
        self.core.current_step.load(Ordering::SeqCst)
    }

    /// Begin executing in the background and return immediately.
    ///
    /// Calling this on a run that already started is a no-op. Fails only when
    /// no tokio runtime is reachable, leaving the run idle.
    pub fn start(&self) -> Result<()> {
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| ProcpilotError::NoRuntime)?,
        };

        if !self.core.transition(RunState::Idle, RunState::Running) {
            debug!(profile = ?self.profile_name, state = ?self.state(), "start ignored; run already started");
            return Ok(());
        }
        self.core.token.activate();

        info!(profile = ?self.profile_name, steps = self.steps.len(), "run started");

        let execution = Execution {
            core: Arc::clone(&self.core),
            steps: Arc::clone(&self.steps),
            options: self.options.clone(),
        };
        runtime.spawn(execution.run());

        Ok(())
    }

    /// Terminate every process group of this run, descendants included.
    ///
    /// No-op unless running. Returns once termination has been attempted for
    /// every handle; individual failures are logged and otherwise ignored.
    /// Safe to call from any thread, any number of times.
    pub fn stop_all(&self) {
        if !self.core.token.cancel() {
            return;
        }
        self.core.state.store(RunState::Stopped as u8, Ordering::SeqCst);

        info!(profile = ?self.profile_name, "stopping run");
        self.core.terminate_all();
    }
}

impl std::fmt::Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("profile_name", &self.profile_name)
            .field("steps", &self.steps.len())
            .field("state", &self.state())
            .field("current_step", &self.current_step())
            .finish()
    }
}

/// The background half of a run.
struct Execution {
    core: Arc<RunCore>,
    steps: Arc<[Step]>,
    options: RunOptions,
}

impl Execution {
    async fn run(self) {
        let mut readers = JoinSet::new();
        let failed_step = self.launch_all(&mut readers).await;

        self.wait_for_exit().await;

        if self.core.token.is_running() {
            // Let the readers flush what the exited processes wrote last.
            if timeout(self.options.drain_timeout, drain(&mut readers))
                .await
                .is_err()
            {
                debug!("output still open after processes exited; detaching readers");
            }
        }
        readers.abort_all();

        // Only one of this and `stop_all` can lower the token; that side
        // decides the outcome.
        let completed = self.core.token.cancel()
            && self.core.transition(RunState::Running, RunState::Completed);

        let outcome = if completed {
            RunOutcome::Completed
        } else {
            self.core
                .state
                .store(RunState::Stopped as u8, Ordering::SeqCst);
            match failed_step {
                Some(step) => RunOutcome::LaunchFailed { step },
                None => RunOutcome::Stopped,
            }
        };

        self.core.emit("");
        self.core.emit(&rule());
        if completed {
            self.core.emit("✅ All steps completed successfully");
        } else {
            self.core.emit("🛑 Execution stopped");
        }
        self.core.emit(&rule());

        self.core.release();

        info!(?outcome, "run finished");
        self.core.finish.fire(outcome);
    }

    /// Launch steps in order. Returns the 1-based index of a step that failed
    /// to launch, if any.
    async fn launch_all(&self, readers: &mut JoinSet<()>) -> Option<usize> {
        let total = self.steps.len();

        for (index, step) in self.steps.iter().enumerate() {
            if !self.core.token.is_running() {
                break;
            }

            let number = index + 1;
            self.core.current_step.store(number, Ordering::SeqCst);
            self.emit_header(number, total, step);

            let spec = LaunchSpec {
                command: &step.command,
                working_directory: step.working_directory(),
            };

            let DetachedChild {
                handle,
                child,
                output,
            } = match self.core.groups.spawn_detached(&spec) {
                Ok(detached) => detached,
                Err(e) => {
                    error!(step = number, command = %step.command, error = %e, "failed to launch step");
                    self.core.emit("");
                    self.core.emit(&format!(
                        "‼ Error launching step {number} '{}': {e}",
                        step.command
                    ));
                    if self.core.token.cancel() {
                        self.core.emit("🛑 Stopping execution due to error.");
                    }
                    return Some(number);
                }
            };

            info!(step = number, pid = handle.pid, command = %step.command, "step launched");

            if !self.core.track(handle, child) {
                debug!(step = number, pid = handle.pid, "run stopped during launch; terminating new process");
                if let Err(e) = self.core.groups.terminate_tree(handle, Termination::Graceful) {
                    warn!(pid = handle.pid, error = %e, "failed to terminate late process group");
                }
                break;
            }

            let prefix = self
                .options
                .prefix_lines
                .then(|| Arc::<str>::from(step.display_label()));
            forward_output(
                readers,
                number,
                output,
                prefix,
                &self.core.token,
                &self.core.sink,
            );

            tokio::select! {
                _ = self.core.token.cancelled() => {}
                _ = sleep(self.options.launch_delay) => {}
            }
        }

        None
    }

    async fn wait_for_exit(&self) {
        loop {
            if !self.core.token.is_running() || self.core.all_exited() {
                return;
            }
            tokio::select! {
                _ = self.core.token.cancelled() => return,
                _ = sleep(self.options.poll_interval) => {}
            }
        }
    }

    fn emit_header(&self, number: usize, total: usize, step: &Step) {
        self.core.emit("");
        self.core.emit(&rule());
        self.core
            .emit(&format!("Step {number}/{total}: {}", step.display_label()));
        self.core.emit(&rule());
        self.core.emit("");
    }
}

async fn drain(readers: &mut JoinSet<()>) {
    while readers.join_next().await.is_some() {}
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}
