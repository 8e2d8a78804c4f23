// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The relay talks to a `ProcessBackend` instead of spawning processes
//! itself. This makes it easy to swap in a scripted backend in tests while
//! keeping the production implementation in [`runner`](super::runner).

use std::future::Future;
use std::pin::Pin;

use crate::types::RunId;

use super::handle::ProcessHandle;
use super::request::ProcessRequest;
use super::runner::{spawn_process, SpawnError};

/// Tuning knobs for the real runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Capacity of the per-process event channel. When it is full the pipe
    /// pumps stop reading, which in turn throttles the child.
    pub buffer_events: usize,
    /// Largest single read from a pipe.
    pub chunk_bytes: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            buffer_events: 64,
            chunk_bytes: 8 * 1024,
        }
    }
}

/// Trait abstracting how a `ProcessRequest` becomes a running process.
///
/// Production code uses [`RealProcessBackend`]; tests can provide their own
/// implementation that replays scripted events without an OS process.
pub trait ProcessBackend: Send + Sync {
    /// Start the process. Resolves once the spawn is confirmed (or failed).
    ///
    /// A returned handle must eventually yield exactly one terminal event
    /// and must honour cancellation through its `CancelHandle`.
    fn spawn(
        &self,
        id: RunId,
        request: ProcessRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessHandle, SpawnError>> + Send + '_>>;
}

/// Real backend used in production: spawns OS processes.
#[derive(Debug, Clone, Default)]
pub struct RealProcessBackend {
    options: RunnerOptions,
}

impl RealProcessBackend {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }
}

impl ProcessBackend for RealProcessBackend {
    fn spawn(
        &self,
        id: RunId,
        request: ProcessRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessHandle, SpawnError>> + Send + '_>> {
        let options = self.options;
        Box::pin(async move { spawn_process(id, &request, options) })
    }
}
