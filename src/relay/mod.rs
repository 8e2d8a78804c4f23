// src/relay/mod.rs

//! Output Relay.
//!
//! Consumes a [`ProcessHandle`]'s events, runs them through the pure
//! [`RelayCore`], and republishes the result in one of two modes:
//!
//! - **collected** ([`Relay::collect`]): wait for the terminal event and
//!   return a single [`Outcome`];
//! - **streaming** ([`Relay::stream`]): forward every deliverable event to a
//!   subscriber over a bounded channel, ending with the terminal event, then
//!   close the channel from the producer side.
//!
//! Every live run is registered in the [`ProcessTable`] so it can be
//! cancelled by id.

pub mod buffer;
pub mod core;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classify::{ClassifierPolicy, Outcome, RunFailure};
use crate::exec::{
    CancelHandle, ProcessBackend, ProcessHandle, ProcessRequest, ProcessTable, SpawnError,
};
use crate::types::{DisconnectPolicy, OutputEvent, RunId};

pub use self::core::{RelayCore, RelayStep, RunState};
pub use self::stream::{encode_record, RunStream};

/// Relay tuning, usually taken from the `[relay]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    /// Bytes of stdout/stderr kept for classification.
    pub capture_limit: usize,
    /// Capacity of the subscriber channel in streaming mode.
    pub buffer_events: usize,
    pub on_disconnect: DisconnectPolicy,
    /// Cancel runs that take longer than this.
    pub timeout: Option<Duration>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            capture_limit: 64 * 1024,
            buffer_events: 64,
            on_disconnect: DisconnectPolicy::Drain,
            timeout: None,
        }
    }
}

#[derive(Clone)]
pub struct Relay {
    backend: Arc<dyn ProcessBackend>,
    table: ProcessTable,
    options: RelayOptions,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("table", &self.table)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Removes the run from the process table when dropped, however the relay
/// ends (terminal event, dropped future, panic).
struct Registration {
    table: ProcessTable,
    id: RunId,
    cancel: CancelHandle,
    finished: bool,
    on_drop: DisconnectPolicy,
}

impl Registration {
    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if !self.finished && self.on_drop == DisconnectPolicy::Cancel {
            debug!(run_id = %self.id, "relay dropped before terminal event; cancelling");
            self.cancel.cancel();
        }
        self.table.remove(self.id);
    }
}

/// A started run: the handle plus its state machine.
struct Session {
    handle: ProcessHandle,
    core: RelayCore,
    registration: Registration,
    deadline: Option<Instant>,
}

impl Relay {
    pub fn new(backend: Arc<dyn ProcessBackend>, table: ProcessTable, options: RelayOptions) -> Self {
        Self {
            backend,
            table,
            options,
        }
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Spawn and register. On spawn failure the core resolves the outcome
    /// and nothing is registered.
    async fn start(
        &self,
        request: ProcessRequest,
        policy: ClassifierPolicy,
    ) -> Result<Session, (SpawnError, Outcome)> {
        let mut core = RelayCore::new(request.flags(), policy, self.options.capture_limit);
        let id = self.table.next_id();
        let cmd = request.command_line();

        match self.backend.spawn(id, request).await {
            Ok(handle) => {
                core.spawned();
                debug!(run_id = %id, pid = ?handle.pid(), cmd = %cmd, "process started");
                let cancel = handle.canceller();
                self.table.register(id, cancel.clone());
                Ok(Session {
                    handle,
                    core,
                    registration: Registration {
                        table: self.table.clone(),
                        id,
                        cancel,
                        finished: false,
                        on_drop: self.options.on_disconnect,
                    },
                    deadline: self.options.timeout.map(|t| Instant::now() + t),
                })
            }
            Err(err) => {
                warn!(run_id = %id, cmd = %cmd, error = %err, "spawn failed");
                let outcome = core
                    .spawn_failed(err.clone())
                    .unwrap_or_else(|| Outcome::Failure(RunFailure::from(err.clone())));
                Err((err, outcome))
            }
        }
    }

    /// Collected mode: run to completion and return one outcome.
    pub async fn collect(&self, request: ProcessRequest, policy: ClassifierPolicy) -> Outcome {
        let mut session = match self.start(request, policy).await {
            Ok(session) => session,
            Err((_, outcome)) => return outcome,
        };
        let id = session.handle.id();

        loop {
            let step = next_step(&mut session.handle, &mut session.core, session.deadline).await;
            if let Some(outcome) = step.outcome {
                session.registration.finish();
                log_outcome(id, &outcome);
                return outcome;
            }
        }
    }

    /// Streaming mode: returns as soon as the spawn is confirmed. Events are
    /// produced by a background task into a channel of `buffer_events`
    /// capacity; the channel is closed right after the terminal event.
    ///
    /// A spawn failure is reported here and no stream is created.
    pub async fn stream(
        &self,
        request: ProcessRequest,
        policy: ClassifierPolicy,
    ) -> Result<RunStream, SpawnError> {
        let session = self.start(request, policy).await.map_err(|(err, _)| err)?;
        let id = session.handle.id();
        let cancel = session.handle.canceller();

        let (event_tx, event_rx) = mpsc::channel::<OutputEvent>(self.options.buffer_events.max(1));
        let (outcome_tx, outcome_rx) = oneshot::channel::<Outcome>();
        let on_disconnect = self.options.on_disconnect;

        tokio::spawn(drive_stream(session, event_tx, outcome_tx, on_disconnect));

        Ok(RunStream::new(id, event_rx, outcome_rx, cancel))
    }
}

/// Producer side of streaming mode.
async fn drive_stream(
    mut session: Session,
    event_tx: mpsc::Sender<OutputEvent>,
    outcome_tx: oneshot::Sender<Outcome>,
    on_disconnect: DisconnectPolicy,
) {
    let id = session.handle.id();
    let mut subscriber = Some(event_tx);

    loop {
        let step = next_step(&mut session.handle, &mut session.core, session.deadline).await;

        if let Some(event) = step.deliver {
            let delivered = match &subscriber {
                Some(sink) => sink.send(event).await.is_ok(),
                None => true,
            };
            if !delivered {
                let failure = RunFailure::Transport("subscriber disconnected".to_string());
                warn!(
                    run_id = %id,
                    error = %failure,
                    policy = %on_disconnect,
                    "stream subscriber gone"
                );
                subscriber = None;
                if on_disconnect == DisconnectPolicy::Cancel {
                    session.handle.cancel();
                }
            }
        }

        if let Some(outcome) = step.outcome {
            session.registration.finish();
            log_outcome(id, &outcome);
            let _ = outcome_tx.send(outcome);
            break;
        }
    }
    // `subscriber` drops here: the stream ends only after the terminal event.
}

/// Wait for whichever comes first: an event, cancellation, or the deadline.
///
/// Cancellation is checked first so that output still buffered in the
/// channel is never delivered after a cancel request.
async fn next_step(
    handle: &mut ProcessHandle,
    core: &mut RelayCore,
    deadline: Option<Instant>,
) -> RelayStep {
    let cancel = handle.canceller();
    if cancel.is_cancelled() {
        return core.cancel();
    }

    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => core.cancel(),
        _ = expired => {
            warn!(run_id = %handle.id(), "run timed out; cancelling");
            cancel.cancel();
            core.cancel()
        }
        event = handle.next_event() => match event {
            Some(event) => {
                if cancel.is_cancelled() {
                    core.cancel()
                } else {
                    core.step(event)
                }
            }
            None => {
                warn!(run_id = %handle.id(), "event source closed without a terminal event");
                core.step(OutputEvent::Exit { code: None })
            }
        },
    }
}

fn log_outcome(id: RunId, outcome: &Outcome) {
    match outcome {
        Outcome::Success(_) => info!(run_id = %id, outcome = outcome.label(), "run finished"),
        Outcome::Failure(f) => {
            info!(run_id = %id, outcome = outcome.label(), error = %f, "run finished")
        }
    }
}
