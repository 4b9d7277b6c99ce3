//! Background run execution
//!
//! [`PipelineExecutor`] hands whole runs to a bounded pool of tokio tasks.
//! Each stage runs on the blocking thread pool through
//! [`PipelineOrchestrator::advance`], so inline and background execution
//! share one code path and produce identical artifacts.

use crate::core::pipeline::{PipelineOrchestrator, PipelineRun, RunStatus};
use crate::domain::errors::SafeDataError;
use crate::domain::ids::RunId;
use crate::domain::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

/// How a worker stopped driving a run, handed to completion callbacks
#[derive(Debug)]
pub enum RunOutcome<'a> {
    /// The run reached `Completed` or `Failed`
    Finished(&'a PipelineRun),
    /// Shutdown stopped the worker between stages; the run is resumable
    Interrupted(&'a PipelineRun),
    /// The worker could not advance the run, e.g. another process holds its lease
    Error(&'a SafeDataError),
}

type CompletionCallback = Box<dyn FnOnce(RunOutcome<'_>) + Send + 'static>;
type Callbacks = Arc<Mutex<HashMap<RunId, Vec<CompletionCallback>>>>;

/// Bounded worker pool for pipeline runs
pub struct PipelineExecutor {
    orchestrator: PipelineOrchestrator,
    permits: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
    tasks: Mutex<HashMap<RunId, JoinHandle<Result<RunStatus>>>>,
    callbacks: Callbacks,
}

impl PipelineExecutor {
    /// Create an executor running at most `workers` runs at once
    ///
    /// When `shutdown` flips to `true`, workers stop at the next stage
    /// boundary and leave their runs resumable.
    pub fn new(
        orchestrator: PipelineOrchestrator,
        workers: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            shutdown,
            tasks: Mutex::new(HashMap::new()),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue a run for background execution
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::RunBusy`] if this executor is already running
    /// the run.
    pub fn submit(&self, run_id: RunId) -> Result<()> {
        let mut tasks = self.tasks.lock();
        if tasks.get(&run_id).is_some_and(|h| !h.is_finished()) {
            return Err(SafeDataError::RunBusy(run_id));
        }

        let orchestrator = self.orchestrator.clone();
        let permits = Arc::clone(&self.permits);
        let shutdown = self.shutdown.clone();
        let callbacks = Arc::clone(&self.callbacks);

        let handle = tokio::spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => drive(&orchestrator, run_id, shutdown).await,
                Err(e) => Err(SafeDataError::State(format!("Executor closed: {e}"))),
            };
            notify(&orchestrator, run_id, &callbacks, &result);
            result
        });

        tasks.insert(run_id, handle);
        tracing::debug!(run_id = %run_id, "Run submitted");
        Ok(())
    }

    /// Register a callback for when a worker stops driving the run
    ///
    /// Every callback registered for a run fires exactly once, the next time
    /// a worker for that run exits: with the terminal run, with the run left
    /// resumable by shutdown, or with the error that stopped the worker.
    /// Runs that are already terminal invoke the callback immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::NotFound`] for an unknown run.
    pub fn on_complete<F>(&self, run_id: RunId, callback: F) -> Result<()>
    where
        F: FnOnce(RunOutcome<'_>) + Send + 'static,
    {
        let mut callbacks = self.callbacks.lock();
        let run = self.orchestrator.get_run(run_id)?;
        if run.is_terminal() {
            drop(callbacks);
            callback(RunOutcome::Finished(&run));
        } else {
            callbacks
                .entry(run_id)
                .or_default()
                .push(Box::new(callback));
        }
        Ok(())
    }

    /// Wait for a submitted run's worker to finish and return the run's status
    ///
    /// Runs this executor is not working on report their persisted status.
    pub async fn wait(&self, run_id: RunId) -> Result<RunStatus> {
        let handle = self.tasks.lock().remove(&run_id);
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| SafeDataError::State(format!("Worker for run {run_id} failed: {e}")))?,
            None => Ok(self.orchestrator.get_run(run_id)?.status()),
        }
    }

    /// Wait for every submitted run
    pub async fn wait_all(&self) -> Vec<(RunId, Result<RunStatus>)> {
        let run_ids: Vec<RunId> = self.tasks.lock().keys().copied().collect();
        let mut results = Vec::with_capacity(run_ids.len());
        for run_id in run_ids {
            results.push((run_id, self.wait(run_id).await));
        }
        results
    }

    /// Runs submitted and not yet finished
    pub fn active_runs(&self) -> usize {
        self.tasks.lock().values().filter(|h| !h.is_finished()).count()
    }
}

async fn drive(
    orchestrator: &PipelineOrchestrator,
    run_id: RunId,
    shutdown: watch::Receiver<bool>,
) -> Result<RunStatus> {
    loop {
        if *shutdown.borrow() {
            let status = orchestrator.get_run(run_id)?.status();
            tracing::info!(run_id = %run_id, status = %status, "Shutdown requested; run left resumable");
            return Ok(status);
        }

        let worker = orchestrator.clone();
        let status = tokio::task::spawn_blocking(move || worker.advance(run_id))
            .await
            .map_err(|e| SafeDataError::State(format!("Stage task for run {run_id} failed: {e}")))??;

        if status.is_terminal() {
            return Ok(status);
        }
    }
}

/// Drain and invoke the run's callbacks once its worker has stopped
fn notify(
    orchestrator: &PipelineOrchestrator,
    run_id: RunId,
    callbacks: &Callbacks,
    result: &Result<RunStatus>,
) {
    let pending = callbacks.lock().remove(&run_id).unwrap_or_default();
    if pending.is_empty() {
        return;
    }

    let run = match result {
        Ok(_) => orchestrator.get_run(run_id),
        Err(e) => {
            for callback in pending {
                callback(RunOutcome::Error(e));
            }
            return;
        }
    };

    match &run {
        Ok(run) if run.is_terminal() => {
            for callback in pending {
                callback(RunOutcome::Finished(run));
            }
        }
        Ok(run) => {
            for callback in pending {
                callback(RunOutcome::Interrupted(run));
            }
        }
        Err(e) => {
            for callback in pending {
                callback(RunOutcome::Error(e));
            }
        }
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("available_permits", &self.permits.available_permits())
            .field("active_runs", &self.active_runs())
            .finish()
    }
}
