// src/run/sink.rs

//! Delivery of run output to the presentation layer.
//!
//! A sink is called from tokio worker threads. Closures work directly; a
//! presentation layer with its own event loop can use [`ChannelSink`] and
//! drain [`RunEvent`]s on its own thread instead.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step launched and every process exited on its own.
    Completed,
    /// `stop_all` was called.
    Stopped,
    /// Step `step` (1-based) could not be launched; later steps never ran.
    LaunchFailed { step: usize },
}

/// Receives output lines, one call per line, without line terminators.
pub trait OutputSink: Send + Sync {
    fn emit(&self, line: &str);
}

impl<F> OutputSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn emit(&self, line: &str) {
        self(line)
    }
}

pub type FinishCallback = Box<dyn FnOnce(RunOutcome) + Send + 'static>;

/// Holds the finish callback and hands it out at most once.
pub(crate) struct FinishSlot {
    callback: Mutex<Option<FinishCallback>>,
}

impl FinishSlot {
    pub(crate) fn new(callback: Option<FinishCallback>) -> Self {
        Self {
            callback: Mutex::new(callback),
        }
    }

    pub(crate) fn fire(&self, outcome: RunOutcome) {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback(outcome);
        }
    }
}

/// Everything a run reports, as a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Output(String),
    Finished(RunOutcome),
}

/// Forwards output lines into an unbounded channel.
///
/// Unbounded because `emit` is synchronous and must never drop a line.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self { tx }
    }

    /// A finish callback posting [`RunEvent::Finished`] on the same channel.
    pub fn finish_callback(&self) -> FinishCallback {
        let tx = self.tx.clone();
        Box::new(move |outcome: RunOutcome| {
            let _ = tx.send(RunEvent::Finished(outcome));
        })
    }
}

impl OutputSink for ChannelSink {
    fn emit(&self, line: &str) {
        // A closed receiver means nobody is listening any more.
        let _ = self.tx.send(RunEvent::Output(line.to_string()));
    }
}
