// src/relay/stream.rs

use futures::future;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::classify::{Outcome, RunFailure};
use crate::exec::CancelHandle;
use crate::types::{OutputEvent, RunId};

/// Subscriber side of a streaming run.
///
/// Events arrive strictly in order and the channel closes after the terminal
/// event. Dropping the stream counts as a disconnect.
#[derive(Debug)]
pub struct RunStream {
    id: RunId,
    events: mpsc::Receiver<OutputEvent>,
    outcome: oneshot::Receiver<Outcome>,
    cancel: CancelHandle,
}

impl RunStream {
    pub(crate) fn new(
        id: RunId,
        events: mpsc::Receiver<OutputEvent>,
        outcome: oneshot::Receiver<Outcome>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            id,
            events,
            outcome,
            cancel,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    /// Next event in order. Once the run is cancelled, output still sitting
    /// in the buffer is skipped and only the terminal event comes through.
    pub async fn next(&mut self) -> Option<OutputEvent> {
        loop {
            let event = self.events.recv().await?;
            if deliverable(&event, &self.cancel) {
                return Some(event);
            }
        }
    }

    pub fn canceller(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the classified outcome. Call after draining the events (or
    /// after dropping interest in them via [`Self::into_events`]).
    pub async fn outcome(self) -> Outcome {
        let Self {
            events, outcome, ..
        } = self;
        // Close our end so a producer blocked on a full channel can finish.
        drop(events);
        outcome.await.unwrap_or_else(|_| {
            Outcome::Failure(RunFailure::Transport(
                "relay ended without an outcome".to_string(),
            ))
        })
    }

    /// Only the events, as a `Stream` (for HTTP bodies). Same suppression
    /// rule as [`Self::next`].
    pub fn into_events(self) -> impl Stream<Item = OutputEvent> + Send + 'static {
        let cancel = self.cancel;
        ReceiverStream::new(self.events)
            .filter(move |event| future::ready(deliverable(event, &cancel)))
    }
}

fn deliverable(event: &OutputEvent, cancel: &CancelHandle) -> bool {
    event.is_terminal() || !cancel.is_cancelled()
}

/// Encode one event as a self-contained `text/event-stream` record:
/// `data: <json>\n\n`.
pub fn encode_record(event: &OutputEvent) -> String {
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    format!("data: {json}\n\n")
}
