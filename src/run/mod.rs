// src/run/mod.rs

//! Run orchestration.
//!
//! - [`orchestrator`] owns a single [`Run`]: launching steps, waiting for
//!   them, and stopping every process group on demand.
//! - [`stream`] forwards each process's stdout/stderr lines to the sink.
//! - [`sink`] defines how output and completion reach the caller.
//! - [`token`] is the cancellation flag shared by all tasks of a run.
//! - [`registry`] tracks live runs and refuses duplicate profile runs.

pub mod orchestrator;
pub mod registry;
pub mod sink;
pub mod stream;
pub mod token;

pub use orchestrator::{Run, RunOptions, RunState};
pub use registry::{RunId, RunRegistry};
pub use sink::{ChannelSink, FinishCallback, OutputSink, RunEvent, RunOutcome};
pub use token::RunToken;
