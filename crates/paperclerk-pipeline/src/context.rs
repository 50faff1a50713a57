//! Per-run state threaded through the orchestrator

use paperclerk_domain::{current_timestamp, RunId, RunMode};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::{Mutex, MutexGuard};

/// State of one run
///
/// Holds the run identity and the placement lock. Whoever holds the lock owns
/// resolve → record → move for one document; the set behind it contains every
/// destination planned or used in this run.
#[derive(Debug)]
pub struct RunContext {
    run_id: RunId,
    mode: RunMode,
    started_at: u64,
    placement: Mutex<HashSet<PathBuf>>,
}

impl RunContext {
    /// Start a run
    pub fn new(mode: RunMode) -> Self {
        Self {
            run_id: RunId::new(),
            mode,
            started_at: current_timestamp(),
            placement: Mutex::new(HashSet::new()),
        }
    }

    /// Run identifier
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Normal or dry run
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Start time (Unix seconds)
    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    /// Acquire the placement lock
    pub async fn placement(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.placement.lock().await
    }
}
