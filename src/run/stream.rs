// src/run/stream.rs

//! Per-process output forwarding.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinSet;
use tracing::debug;

use crate::process::OutputPipe;

use super::sink::OutputSink;
use super::token::RunToken;

/// Spawn the reader for a launched process's merged stdout/stderr pipe.
///
/// Lines of one process arrive in the order it wrote them; lines of
/// different steps may interleave.
pub(crate) fn forward_output(
    readers: &mut JoinSet<()>,
    step: usize,
    output: OutputPipe,
    prefix: Option<Arc<str>>,
    token: &RunToken,
    sink: &Arc<dyn OutputSink>,
) {
    readers.spawn(forward_lines(
        output,
        step,
        prefix,
        token.clone(),
        Arc::clone(sink),
    ));
}

/// Forward lines verbatim until EOF, a read error, or the run is cancelled.
///
/// Invalid UTF-8 is replaced rather than treated as an error.
async fn forward_lines<R>(
    pipe: R,
    step: usize,
    prefix: Option<Arc<str>>,
    token: RunToken,
    sink: Arc<dyn OutputSink>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();

        let read = tokio::select! {
            _ = token.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                if !token.is_running() {
                    break;
                }
                let line = String::from_utf8_lossy(trim_line_ending(&buf));
                match prefix.as_deref() {
                    Some(p) => sink.emit(&format!("[{p}] {line}")),
                    None => sink.emit(&line),
                }
            }
            Err(e) => {
                debug!(step, error = %e, "output pipe read failed");
                break;
            }
        }
    }

    debug!(step, "output reader finished");
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
