// src/exec/table.rs

//! Bookkeeping of live runs.
//!
//! The table is the only state shared between concurrent requests. It maps
//! each live [`RunId`] to its [`CancelHandle`] so a run can be cancelled by id
//! (e.g. from a separate HTTP request). Entries exist only between a
//! successful spawn and the terminal event; spawn failures never appear here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::exec::CancelHandle;
use crate::types::RunId;

#[derive(Debug, Default)]
struct TableInner {
    next_id: u64,
    live: HashMap<RunId, CancelHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    inner: Arc<Mutex<TableInner>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        // The map stays consistent even if a holder panicked mid-call.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a fresh, never reused id.
    pub fn next_id(&self) -> RunId {
        let mut inner = self.lock();
        inner.next_id += 1;
        RunId(inner.next_id)
    }

    pub fn register(&self, id: RunId, cancel: CancelHandle) {
        debug!(run_id = %id, "registering live run");
        self.lock().live.insert(id, cancel);
    }

    pub fn remove(&self, id: RunId) -> Option<CancelHandle> {
        let removed = self.lock().live.remove(&id);
        if removed.is_some() {
            debug!(run_id = %id, "run left the process table");
        }
        removed
    }

    /// Request cancellation of a live run. Returns `false` if the id is
    /// unknown or already finished.
    pub fn cancel(&self, id: RunId) -> bool {
        let handle = self.lock().live.get(&id).cloned();
        match handle {
            Some(handle) => {
                info!(run_id = %id, "cancellation requested");
                handle.cancel();
                true
            }
            None => {
                debug!(run_id = %id, "cancel requested for unknown run");
                false
            }
        }
    }

    /// Cancel every live run (used on shutdown).
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<CancelHandle> = self.lock().live.values().cloned().collect();
        for handle in &handles {
            handle.cancel();
        }
        handles.len()
    }

    pub fn contains(&self, id: RunId) -> bool {
        self.lock().live.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    pub fn live_ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.lock().live.keys().copied().collect();
        ids.sort();
        ids
    }
}
