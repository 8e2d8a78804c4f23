// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of one runner invocation, issued by the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(RunId)
    }
}

/// One observable unit of process activity.
///
/// Serialized as the JSON payload of a stream record:
/// `{"type":"output","content":..}`, `{"type":"error","content":..}`,
/// `{"type":"exit","code":..}` or `{"type":"cancelled"}`.
///
/// `Exit` and `Cancelled` are terminal; nothing follows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputEvent {
    Output { content: String },
    Error { content: String },
    /// `code` is `None` when the process was terminated by a signal.
    Exit { code: Option<i32> },
    Cancelled,
}

impl OutputEvent {
    pub fn output(content: impl Into<String>) -> Self {
        OutputEvent::Output {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        OutputEvent::Error {
            content: content.into(),
        }
    }

    pub fn exit(code: i32) -> Self {
        OutputEvent::Exit { code: Some(code) }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OutputEvent::Exit { .. } | OutputEvent::Cancelled)
    }
}

/// What the streaming relay does when its subscriber goes away.
///
/// - `Drain`: keep the process running to completion, discarding output.
/// - `Cancel`: terminate the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectPolicy {
    #[default]
    Drain,
    Cancel,
}

impl FromStr for DisconnectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drain" => Ok(DisconnectPolicy::Drain),
            "cancel" => Ok(DisconnectPolicy::Cancel),
            other => Err(format!(
                "invalid on_disconnect: {other} (expected \"drain\" or \"cancel\")"
            )),
        }
    }
}

impl fmt::Display for DisconnectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectPolicy::Drain => f.write_str("drain"),
            DisconnectPolicy::Cancel => f.write_str("cancel"),
        }
    }
}
