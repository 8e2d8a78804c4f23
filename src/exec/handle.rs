// src/exec/handle.rs

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::types::{OutputEvent, RunId};

/// Cloneable trigger for caller-initiated cancellation of one run.
///
/// Cancelling is idempotent. The runner kills the child and discards any
/// output still in its pipes; the relay emits a single `Cancelled` terminal.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// The caller's view of one running external process.
///
/// Events arrive in order on a bounded channel; the last one is always a
/// terminal event (`Exit` or `Cancelled`) unless the backend itself died.
/// The captured stdout/stderr text and the terminal state are accumulated by
/// the relay that consumes this handle.
#[derive(Debug)]
pub struct ProcessHandle {
    id: RunId,
    pid: Option<u32>,
    events: mpsc::Receiver<OutputEvent>,
    cancel: CancelHandle,
}

impl ProcessHandle {
    /// Assemble a handle. Backends other than the real one (e.g. test
    /// doubles) use this to hand out their own event channels.
    pub fn new(
        id: RunId,
        pid: Option<u32>,
        events: mpsc::Receiver<OutputEvent>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            id,
            pid,
            events,
            cancel,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    /// OS process id, if the backend has one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the next event. `None` means the producer is gone.
    pub async fn next_event(&mut self) -> Option<OutputEvent> {
        self.events.recv().await
    }

    pub fn canceller(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
