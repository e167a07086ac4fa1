//! Active set - operations currently executing for one campaign

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::Operation;

/// An operation handed to the executor
#[derive(Debug)]
pub struct ActiveEntry {
    pub operation: Operation,
    pub started: Instant,
    abort: Option<AbortHandle>,
}

/// Executing operations in dispatch order
#[derive(Debug, Default)]
pub struct ActiveSet {
    entries: Vec<ActiveEntry>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, operation: Operation, started: Instant) {
        debug!(id = %operation.id, "ActiveSet::insert: called");
        self.entries.push(ActiveEntry {
            operation,
            started,
            abort: None,
        });
    }

    /// Attach the execution task's abort handle to an entry
    pub fn attach(&mut self, id: &str, abort: AbortHandle) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.operation.id == id) {
            entry.abort = Some(abort);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ActiveEntry> {
        debug!(%id, "ActiveSet::remove: called");
        let idx = self.entries.iter().position(|e| e.operation.id == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn snapshot(&self) -> Vec<Operation> {
        self.entries.iter().map(|e| e.operation.clone()).collect()
    }

    /// Drop every entry, optionally aborting their execution tasks
    pub fn clear(&mut self, abort_tasks: bool) -> usize {
        debug!(abort_tasks, count = self.entries.len(), "ActiveSet::clear: called");
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            if abort_tasks && let Some(handle) = entry.abort {
                handle.abort();
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
