//! Run repository port and the per-run lease
//!
//! The repository is the only shared state between execution contexts. The
//! lease gives one context the exclusive right to advance a run; the
//! cancellation flag lives outside the lease so a cancel request never waits
//! on a running stage.

use crate::core::pipeline::run::PipelineRun;
use crate::domain::errors::SafeDataError;
use crate::domain::ids::RunId;
use crate::domain::Result;
use std::sync::Arc;

/// Persistence for pipeline runs
pub trait RunRepository: Send + Sync {
    /// Store a new run; fails if the id already exists
    fn insert(&self, run: &PipelineRun) -> Result<()>;

    /// Load a run; [`SafeDataError::NotFound`] if unknown
    fn load(&self, run_id: RunId) -> Result<PipelineRun>;

    /// Overwrite an existing run
    fn save(&self, run: &PipelineRun) -> Result<()>;

    /// All runs, oldest first
    fn list(&self) -> Result<Vec<PipelineRun>>;

    /// Take the lease without blocking; `false` if another context holds it
    fn try_lock(&self, run_id: RunId) -> Result<bool>;

    /// Release the lease (no-op if not held)
    fn unlock(&self, run_id: RunId) -> Result<()>;

    fn request_cancel(&self, run_id: RunId) -> Result<()>;

    fn is_cancel_requested(&self, run_id: RunId) -> Result<bool>;

    fn clear_cancel(&self, run_id: RunId) -> Result<()>;
}

/// Exclusive right to advance one run, released on drop
pub struct RunLease {
    repository: Arc<dyn RunRepository>,
    run_id: RunId,
}

impl RunLease {
    /// Acquire the lease or fail fast
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::RunBusy`] if another context holds the lease.
    pub fn acquire(repository: Arc<dyn RunRepository>, run_id: RunId) -> Result<Self> {
        if repository.try_lock(run_id)? {
            tracing::trace!(run_id = %run_id, "Lease acquired");
            Ok(Self {
                repository,
                run_id,
            })
        } else {
            Err(SafeDataError::RunBusy(run_id))
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        if let Err(e) = self.repository.unlock(self.run_id) {
            tracing::warn!(run_id = %self.run_id, error = %e, "Failed to release run lease");
        }
    }
}

impl std::fmt::Debug for RunLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLease")
            .field("run_id", &self.run_id)
            .finish()
    }
}
