// src/exec/mod.rs

//! Command Runner.
//!
//! This module is responsible for actually launching external programs using
//! `tokio::process::Command` and turning their pipes and exit status into an
//! ordered stream of [`OutputEvent`](crate::types::OutputEvent)s.
//!
//! - [`request`] holds the immutable `ProcessRequest` value.
//! - [`runner`] spawns the child and owns the pipe pumps and the supervisor
//!   that emits exactly one terminal event.
//! - [`handle`] is the caller's view of one running process.
//! - [`table`] is the process-table bookkeeping used for cancellation.
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `RealProcessBackend`; tests swap in a scripted backend.
//! - [`chunk`] decodes raw pipe bytes into UTF-8 text chunks.

pub mod backend;
pub mod chunk;
pub mod handle;
pub mod request;
pub mod runner;
pub mod table;

pub use backend::{ProcessBackend, RealProcessBackend, RunnerOptions};
pub use handle::{CancelHandle, ProcessHandle};
pub use request::{ProcessRequest, RequestFlags};
pub use runner::SpawnError;
pub use table::ProcessTable;
