// src/relay/core.rs

//! Pure per-request relay state machine.
//!
//! `RelayCore` consumes runner events and produces:
//! - the event (if any) that may be delivered to the subscriber,
//! - the final `Outcome`, exactly once.
//!
//! It has no channels and performs no IO, so ordering and termination rules
//! can be tested without processes:
//!
//! `Pending -> Running -> {Succeeded, Failed}` and `Pending -> SpawnFailed`.
//! Once terminal, every further event is dropped.

use tracing::trace;

use crate::classify::{classify, ClassifierPolicy, Outcome, RunFailure};
use crate::exec::{RequestFlags, SpawnError};
use crate::types::OutputEvent;

use super::buffer::CappedBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
    SpawnFailed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::SpawnFailed
        )
    }
}

/// Result of feeding one event into the core.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RelayStep {
    /// Event to forward to the subscriber.
    pub deliver: Option<OutputEvent>,
    /// Set on the step that ends the run.
    pub outcome: Option<Outcome>,
}

#[derive(Debug)]
pub struct RelayCore {
    state: RunState,
    flags: RequestFlags,
    policy: ClassifierPolicy,
    stdout: CappedBuffer,
    stderr: CappedBuffer,
}

impl RelayCore {
    pub fn new(flags: RequestFlags, policy: ClassifierPolicy, capture_limit: usize) -> Self {
        Self {
            state: RunState::Pending,
            flags,
            policy,
            stdout: CappedBuffer::new(capture_limit),
            stderr: CappedBuffer::new(capture_limit),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stdout(&self) -> &str {
        self.stdout.as_str()
    }

    pub fn stderr(&self) -> &str {
        self.stderr.as_str()
    }

    /// Spawn confirmed. Returns `false` (and changes nothing) unless the run
    /// was still pending.
    pub fn spawned(&mut self) -> bool {
        if self.state != RunState::Pending {
            return false;
        }
        self.state = RunState::Running;
        true
    }

    /// Spawn failed. Only legal from `Pending`.
    pub fn spawn_failed(&mut self, err: SpawnError) -> Option<Outcome> {
        if self.state != RunState::Pending {
            return None;
        }
        self.state = RunState::SpawnFailed;
        Some(Outcome::Failure(RunFailure::from(err)))
    }

    pub fn step(&mut self, event: OutputEvent) -> RelayStep {
        if self.state != RunState::Running {
            trace!(state = ?self.state, ?event, "dropping event outside Running");
            return RelayStep::default();
        }

        match event {
            OutputEvent::Output { ref content } => {
                self.stdout.push(content);
                RelayStep {
                    deliver: Some(event),
                    outcome: None,
                }
            }
            OutputEvent::Error { ref content } => {
                self.stderr.push(content);
                RelayStep {
                    deliver: Some(event),
                    outcome: None,
                }
            }
            OutputEvent::Exit { code } => {
                let outcome = classify(
                    code,
                    self.stdout.as_str(),
                    self.stderr.as_str(),
                    self.flags,
                    &self.policy,
                );
                self.state = if outcome.is_success() {
                    RunState::Succeeded
                } else {
                    RunState::Failed
                };
                RelayStep {
                    deliver: Some(event),
                    outcome: Some(outcome),
                }
            }
            OutputEvent::Cancelled => self.cancel(),
        }
    }

    /// Caller-initiated cancellation. Ends a running run with a synthetic
    /// `Cancelled` terminal; no-op otherwise.
    pub fn cancel(&mut self) -> RelayStep {
        if self.state != RunState::Running {
            return RelayStep::default();
        }
        self.state = RunState::Failed;
        RelayStep {
            deliver: Some(OutputEvent::Cancelled),
            outcome: Some(Outcome::Failure(RunFailure::Cancelled)),
        }
    }
}
