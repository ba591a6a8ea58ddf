#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use procpilot::config::Step;
use procpilot::run::{Run, RunOptions};
use procpilot_test_utils::sink::RecordingSink;

pub use procpilot_test_utils::{init_tracing, with_timeout};

/// Short delays so tests don't sit in cosmetic pauses.
pub fn fast_options() -> RunOptions {
    RunOptions {
        launch_delay: Duration::from_millis(10),
        poll_interval: Duration::from_millis(10),
        ..RunOptions::default()
    }
}

/// A run wired to a fresh [`RecordingSink`] for both output and finish.
pub fn recorded_run(steps: Vec<Step>) -> (Run, Arc<RecordingSink>) {
    let sink = RecordingSink::new();
    let run = Run::with_sink(steps, sink.clone(), Some(sink.finish_callback()))
        .with_options(fast_options());
    (run, sink)
}

/// Poll `cond` every 10ms until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Whether `pid` names a live, non-zombie process (Linux `/proc`).
#[cfg(target_os = "linux")]
pub fn process_alive(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // The state letter follows the parenthesised command name.
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .is_some_and(|state| state != "Z" && state != "X")
}
