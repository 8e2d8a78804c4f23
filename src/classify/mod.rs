// src/classify/mod.rs

//! Outcome Classifier.
//!
//! Maps an exit code plus captured text plus request flags to an [`Outcome`].
//! The rules that go beyond "zero is success" are per-invocation
//! configuration ([`ClassifierPolicy`]), never global behaviour:
//!
//! 1. under `overwrite`, the policy's sentinel exit code is a success. The
//!    wrapped tool reports "already present, replaced" this way, and its
//!    stderr then names the conflict, so keywords are not consulted;
//! 2. keyword scan of stderr (if the policy has keywords): a match is a
//!    failure whatever the exit code, unless the matching line contains a
//!    benign phrase;
//! 3. no exit code (signal) is a failure;
//! 4. exit code `0` is a success;
//! 5. anything else is a failure carrying the normalized stderr.
//!
//! The keyword scan is a heuristic: it depends on the wording (and locale)
//! of the wrapped tool.

pub mod normalize;
pub mod policy;

use serde::Serialize;
use thiserror::Error;

use crate::exec::{RequestFlags, SpawnError};

pub use normalize::normalize_message;
pub use policy::{ClassifierPolicy, KeywordMatch, KeywordRule, PolicySet};

/// Why a run did not succeed. `Display` is the one-line message shown to
/// callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    /// The program could not be started.
    #[error("{0}")]
    Spawn(String),

    /// Non-zero (or missing) exit code not covered by an override.
    #[error("{message}")]
    Runtime { code: Option<i32>, message: String },

    /// A failure keyword was found in stderr.
    #[error("{context}")]
    Keyword { keyword: String, context: String },

    /// The caller cancelled the run.
    #[error("cancelled")]
    Cancelled,

    /// Events could not be delivered to the subscriber.
    #[error("{0}")]
    Transport(String),

    /// An action's precondition failed; nothing was spawned.
    #[error("{0}")]
    Preflight(String),
}

impl RunFailure {
    /// Short machine-readable tag, used in logs and HTTP error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            RunFailure::Spawn(_) => "spawn",
            RunFailure::Runtime { .. } => "runtime",
            RunFailure::Keyword { .. } => "keyword",
            RunFailure::Cancelled => "cancelled",
            RunFailure::Transport(_) => "transport",
            RunFailure::Preflight(_) => "preflight",
        }
    }
}

impl From<SpawnError> for RunFailure {
    fn from(err: SpawnError) -> Self {
        RunFailure::Spawn(err.0)
    }
}

/// The resolved result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Option<String>),
    Failure(RunFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(f) => Some(f),
        }
    }

    /// Short tag for logs: `success` or the failure kind.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(f) => f.kind(),
        }
    }

    pub fn into_result(self) -> Result<Option<String>, RunFailure> {
        match self {
            Outcome::Success(msg) => Ok(msg),
            Outcome::Failure(f) => Err(f),
        }
    }
}

/// Wire shape of a collected result: `{success: true}` or
/// `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<&Outcome> for ActionResult {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success(_) => ActionResult::ok(),
            Outcome::Failure(f) => ActionResult::failed(f.to_string()),
        }
    }
}

impl From<Outcome> for ActionResult {
    fn from(outcome: Outcome) -> Self {
        ActionResult::from(&outcome)
    }
}

/// Decide the outcome of a finished process.
pub fn classify(
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
    flags: RequestFlags,
    policy: &ClassifierPolicy,
) -> Outcome {
    if flags.overwrite && exit_code.is_some() && policy.overwrite_sentinel == exit_code {
        return Outcome::Success(last_line(stdout));
    }

    if let Some(hit) = policy.keywords.scan(stderr) {
        return Outcome::Failure(RunFailure::Keyword {
            keyword: hit.keyword,
            context: hit.context,
        });
    }

    let Some(code) = exit_code else {
        return Outcome::Failure(RunFailure::Runtime {
            code: None,
            message: failure_message(stderr, "process was terminated by a signal".to_string()),
        });
    };

    if code == 0 {
        return Outcome::Success(last_line(stdout));
    }

    Outcome::Failure(RunFailure::Runtime {
        code: Some(code),
        message: failure_message(stderr, format!("process exited with code {code}")),
    })
}

fn failure_message(stderr: &str, fallback: String) -> String {
    let message = normalize_message(stderr);
    if message.is_empty() { fallback } else { message }
}

fn last_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .rev()
        .map(normalize_message)
        .find(|line| !line.is_empty())
}
