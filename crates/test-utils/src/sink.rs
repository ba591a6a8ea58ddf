use std::sync::{Arc, Mutex};

use procpilot::run::{FinishCallback, OutputSink, RunOutcome};
use tokio::sync::Notify;

/// An output sink that records every line and every finish notification.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
    outcomes: Mutex<Vec<RunOutcome>>,
    finished: Notify,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Index of the first line containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.contains(needle))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }

    /// Number of lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(needle)).count()
    }

    /// Last non-empty line.
    pub fn last_text(&self) -> Option<String> {
        self.lines()
            .into_iter()
            .rev()
            .find(|l| !l.trim().is_empty() && !l.chars().all(|c| c == '='))
    }

    /// Every outcome delivered through [`finish_callback`](Self::finish_callback).
    pub fn outcomes(&self) -> Vec<RunOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn finish_callback(self: &Arc<Self>) -> FinishCallback {
        let sink = Arc::clone(self);
        Box::new(move |outcome: RunOutcome| {
            sink.outcomes.lock().unwrap().push(outcome);
            sink.finished.notify_waiters();
        })
    }

    /// Wait until the first finish notification and return its outcome.
    pub async fn wait_finished(&self) -> RunOutcome {
        loop {
            let notified = self.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.outcomes().first() {
                return *outcome;
            }
            notified.await;
        }
    }
}

impl OutputSink for RecordingSink {
    fn emit(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
