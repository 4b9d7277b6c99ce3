//! In-process run repository

use crate::core::pipeline::run::PipelineRun;
use crate::core::state::repository::RunRepository;
use crate::domain::errors::SafeDataError;
use crate::domain::ids::RunId;
use crate::domain::Result;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

/// Runs held in memory; lost when the process exits
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    runs: Mutex<BTreeMap<RunId, PipelineRun>>,
    leases: Mutex<HashSet<RunId>>,
    cancellations: Mutex<HashSet<RunId>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunRepository for InMemoryRunRepository {
    fn insert(&self, run: &PipelineRun) -> Result<()> {
        let mut runs = self.runs.lock();
        if runs.contains_key(&run.id()) {
            return Err(SafeDataError::State(format!("Run {} already exists", run.id())));
        }
        runs.insert(run.id(), run.clone());
        Ok(())
    }

    fn load(&self, run_id: RunId) -> Result<PipelineRun> {
        self.runs
            .lock()
            .get(&run_id)
            .cloned()
            .ok_or_else(|| SafeDataError::NotFound(format!("Run {run_id}")))
    }

    fn save(&self, run: &PipelineRun) -> Result<()> {
        let mut runs = self.runs.lock();
        match runs.get_mut(&run.id()) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(SafeDataError::NotFound(format!("Run {}", run.id()))),
        }
    }

    fn list(&self) -> Result<Vec<PipelineRun>> {
        let mut runs: Vec<PipelineRun> = self.runs.lock().values().cloned().collect();
        runs.sort_by_key(|r| r.created_at());
        Ok(runs)
    }

    fn try_lock(&self, run_id: RunId) -> Result<bool> {
        Ok(self.leases.lock().insert(run_id))
    }

    fn unlock(&self, run_id: RunId) -> Result<()> {
        self.leases.lock().remove(&run_id);
        Ok(())
    }

    fn request_cancel(&self, run_id: RunId) -> Result<()> {
        if !self.runs.lock().contains_key(&run_id) {
            return Err(SafeDataError::NotFound(format!("Run {run_id}")));
        }
        self.cancellations.lock().insert(run_id);
        Ok(())
    }

    fn is_cancel_requested(&self, run_id: RunId) -> Result<bool> {
        Ok(self.cancellations.lock().contains(&run_id))
    }

    fn clear_cancel(&self, run_id: RunId) -> Result<()> {
        self.cancellations.lock().remove(&run_id);
        Ok(())
    }
}
