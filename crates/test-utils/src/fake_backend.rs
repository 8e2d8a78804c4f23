use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bones::exec::{CancelHandle, ProcessBackend, ProcessHandle, ProcessRequest, SpawnError};
use bones::types::{OutputEvent, RunId};
use tokio::sync::mpsc;

/// One step of a scripted process.
#[derive(Debug, Clone)]
pub enum Step {
    Emit(OutputEvent),
    Sleep(Duration),
    /// Block until cancelled.
    Hang,
}

/// What a scripted process "printed" and how it ended. A script without a
/// terminal event closes its channel, like a process whose supervisor died.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.steps.push(Step::Emit(OutputEvent::output(text)));
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.steps.push(Step::Emit(OutputEvent::error(text)));
        self
    }

    pub fn sleep_ms(mut self, ms: u64) -> Self {
        self.steps.push(Step::Sleep(Duration::from_millis(ms)));
        self
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.steps.push(Step::Emit(OutputEvent::exit(code)));
        self
    }

    /// Terminated by a signal.
    pub fn killed(mut self) -> Self {
        self.steps.push(Step::Emit(OutputEvent::Exit { code: None }));
        self
    }

    pub fn hang(mut self) -> Self {
        self.steps.push(Step::Hang);
        self
    }
}

/// How a scripted process ended, from the backend's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finish {
    /// Every step ran; carries the terminal event if the script had one.
    Completed(Option<OutputEvent>),
    Cancelled,
    /// The consumer dropped the handle mid-script.
    Abandoned,
}

#[derive(Debug, Default)]
struct Recorded {
    requests: Vec<ProcessRequest>,
    finished: Vec<(RunId, Finish)>,
}

/// A [`ProcessBackend`] that replays scripts keyed by program name instead
/// of starting OS processes. Unknown programs fail to spawn.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    recorded: Arc<Mutex<Recorded>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, program: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(program.to_string(), script);
        self
    }

    /// Every request that reached `spawn`, including failed ones.
    pub fn requests(&self) -> Vec<ProcessRequest> {
        self.recorded.lock().unwrap().requests.clone()
    }

    pub fn finished(&self) -> Vec<(RunId, Finish)> {
        self.recorded.lock().unwrap().finished.clone()
    }

    /// Poll until `n` scripts have finished or `timeout` passes.
    pub async fn wait_finished(&self, n: usize, timeout: Duration) -> Vec<(RunId, Finish)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let finished = self.finished();
            if finished.len() >= n || tokio::time::Instant::now() >= deadline {
                return finished;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl ProcessBackend for ScriptedBackend {
    fn spawn(
        &self,
        id: RunId,
        request: ProcessRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessHandle, SpawnError>> + Send + '_>> {
        Box::pin(async move {
            let script = self.scripts.lock().unwrap().get(request.program()).cloned();
            let program = request.program().to_string();
            self.recorded.lock().unwrap().requests.push(request);

            let Some(script) = script else {
                return Err(SpawnError::new(format!(
                    "failed to start '{program}': program not found"
                )));
            };

            let (tx, rx) = mpsc::channel(8);
            let cancel = CancelHandle::new();
            let recorded = Arc::clone(&self.recorded);
            let token = cancel.clone();

            tokio::spawn(async move {
                let finish = play(script, tx, token).await;
                recorded.lock().unwrap().finished.push((id, finish));
            });

            Ok(ProcessHandle::new(id, None, rx, cancel))
        })
    }
}

async fn play(script: Script, tx: mpsc::Sender<OutputEvent>, cancel: CancelHandle) -> Finish {
    for step in script.steps {
        match step {
            Step::Emit(event) => {
                let terminal = event.is_terminal();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Finish::Cancelled,
                    sent = tx.send(event.clone()) => {
                        if sent.is_err() {
                            return Finish::Abandoned;
                        }
                    }
                }
                if terminal {
                    return Finish::Completed(Some(event));
                }
            }
            Step::Sleep(d) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Finish::Cancelled,
                    _ = tokio::time::sleep(d) => {}
                }
            }
            Step::Hang => {
                cancel.cancelled().await;
                return Finish::Cancelled;
            }
        }
    }
    Finish::Completed(None)
}
