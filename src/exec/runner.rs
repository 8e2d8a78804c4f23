// src/exec/runner.rs

//! Individual process runner.
//!
//! Each spawned process gets three Tokio tasks:
//! - one pump per pipe, forwarding decoded chunks in arrival order,
//! - a supervisor that waits for exit (or cancellation) and then emits the
//!   single terminal event.

use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::exec::chunk::Utf8Chunker;
use crate::types::{OutputEvent, RunId};

use super::backend::RunnerOptions;
use super::handle::{CancelHandle, ProcessHandle};
use super::request::ProcessRequest;

/// The external program could not be started.
///
/// Distinct from a non-zero exit: no process ever existed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SpawnError(pub String);

impl SpawnError {
    pub fn new(message: impl Into<String>) -> Self {
        SpawnError(message.into())
    }

    fn from_io(request: &ProcessRequest, err: &io::Error) -> Self {
        let program = request.program();
        match err.kind() {
            io::ErrorKind::NotFound => {
                SpawnError(format!("failed to start '{program}': program not found"))
            }
            io::ErrorKind::PermissionDenied => {
                SpawnError(format!("failed to start '{program}': permission denied"))
            }
            _ => SpawnError(format!("failed to start '{program}': {err}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

impl Pipe {
    fn event(self, content: String) -> OutputEvent {
        match self {
            Pipe::Stdout => OutputEvent::Output { content },
            Pipe::Stderr => OutputEvent::Error { content },
        }
    }

    fn name(self) -> &'static str {
        match self {
            Pipe::Stdout => "stdout",
            Pipe::Stderr => "stderr",
        }
    }
}

/// Spawn the process described by `request` and start observing it.
///
/// Fails immediately if the working directory is not a directory or the
/// program cannot be started.
pub fn spawn_process(
    id: RunId,
    request: &ProcessRequest,
    options: RunnerOptions,
) -> Result<ProcessHandle, SpawnError> {
    if !request.cwd().is_dir() {
        return Err(SpawnError(format!(
            "failed to start '{}': working directory '{}' does not exist",
            request.program(),
            request.cwd().display()
        )));
    }

    let mut cmd = request.to_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| SpawnError::from_io(request, &e))?;

    let pid = child.id();
    info!(
        run_id = %id,
        pid,
        cmd = %request.command_line(),
        cwd = %request.cwd().display(),
        shell = request.flags().shell,
        "process spawned"
    );

    let (tx, rx) = mpsc::channel::<OutputEvent>(options.buffer_events.max(1));
    let cancel = CancelHandle::new();
    let chunk_bytes = options.chunk_bytes.max(1);

    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(
            id,
            Pipe::Stdout,
            stdout,
            tx.clone(),
            cancel.clone(),
            chunk_bytes,
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(
            id,
            Pipe::Stderr,
            stderr,
            tx.clone(),
            cancel.clone(),
            chunk_bytes,
        )));
    }

    tokio::spawn(supervise(id, child, pumps, tx, cancel.clone()));

    Ok(ProcessHandle::new(id, pid, rx, cancel))
}

/// Forward one pipe as text chunks.
///
/// Chunk boundaries follow the reads, not lines. Once the receiver is gone or
/// the run is cancelled the pump keeps reading and discards, so the child
/// never blocks forever on a full OS pipe.
async fn pump<R>(
    id: RunId,
    pipe: Pipe,
    mut reader: R,
    tx: mpsc::Sender<OutputEvent>,
    cancel: CancelHandle,
    chunk_bytes: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_bytes];
    let mut decoder = Utf8Chunker::new();
    let mut forwarding = true;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(run_id = %id, pipe = pipe.name(), error = %e, "pipe read failed");
                break;
            }
        };

        if !forwarding || cancel.is_cancelled() {
            trace!(run_id = %id, pipe = pipe.name(), bytes = n, "discarding output");
            continue;
        }

        let text = decoder.push(&buf[..n]);
        if text.is_empty() {
            continue;
        }
        trace!(run_id = %id, pipe = pipe.name(), chunk = %text, "chunk");

        tokio::select! {
            sent = tx.send(pipe.event(text)) => {
                if sent.is_err() {
                    debug!(run_id = %id, pipe = pipe.name(), "receiver gone; draining pipe");
                    forwarding = false;
                }
            }
            _ = cancel.cancelled() => {
                forwarding = false;
            }
        }
    }

    if forwarding && !cancel.is_cancelled() && decoder.has_pending() {
        let _ = tx.send(pipe.event(decoder.finish())).await;
    }
    debug!(run_id = %id, pipe = pipe.name(), "pipe closed");
}

enum Waited {
    Exited(Option<i32>),
    WaitFailed(io::Error),
    Cancelled,
}

/// Wait for the child, then emit exactly one terminal event.
///
/// On normal exit the pumps are joined first so that every chunk read before
/// the pipes closed is sent ahead of `Exit`.
async fn supervise(
    id: RunId,
    mut child: Child,
    pumps: Vec<JoinHandle<()>>,
    tx: mpsc::Sender<OutputEvent>,
    cancel: CancelHandle,
) {
    let waited = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => Waited::Exited(status.code()),
            Err(e) => Waited::WaitFailed(e),
        },
        _ = cancel.cancelled() => Waited::Cancelled,
    };

    let terminal = match waited {
        Waited::Exited(code) => {
            let drained = async {
                for pump in pumps {
                    let _ = pump.await;
                }
            };
            tokio::select! {
                _ = drained => {
                    info!(run_id = %id, exit_code = ?code, "process exited");
                    OutputEvent::Exit { code }
                }
                _ = cancel.cancelled() => {
                    info!(run_id = %id, "cancelled while draining output");
                    OutputEvent::Cancelled
                }
            }
        }
        Waited::WaitFailed(e) => {
            warn!(run_id = %id, error = %e, "failed to wait on process");
            let _ = tx
                .send(OutputEvent::error(format!("failed to wait on process: {e}")))
                .await;
            OutputEvent::Exit { code: None }
        }
        Waited::Cancelled => {
            info!(run_id = %id, "cancellation requested; killing process");
            if let Err(e) = child.kill().await {
                warn!(run_id = %id, error = %e, "failed to kill process on cancellation");
            }
            OutputEvent::Cancelled
        }
    };

    if tx.send(terminal).await.is_err() {
        debug!(run_id = %id, "terminal event dropped; receiver gone");
    }
}
