//! Pipeline orchestrator
//!
//! Drives a [`PipelineRun`] through its stages one transition at a time.
//! Every call to [`PipelineOrchestrator::advance`] holds the run's lease for
//! the whole read, execute, persist cycle, so the orchestrator can be shared
//! freely between the CLI, threads and executor workers.

use crate::adapters::storage::DatasetStorage;
use crate::audit::{AuditEvent, AuditLogger};
use crate::core::pipeline::report::PipelineReport;
use crate::core::pipeline::run::{PipelineRun, RunFailure, RunRequest, RunStatus};
use crate::core::state::{RunLease, RunRepository};
use crate::core::verification::table_checksum;
use crate::domain::errors::{ErrorKind, SafeDataError};
use crate::domain::ids::RunId;
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use crate::privacy::{PrivacyEnhancementConfig, PrivacyEnhancementEngine};
use crate::risk::RiskAssessmentEngine;
use crate::utility::UtilityEvaluationEngine;
use std::sync::Arc;
use std::time::Instant;

/// Runs the risk, enhancement and utility stages against persisted runs
#[derive(Clone)]
pub struct PipelineOrchestrator {
    repository: Arc<dyn RunRepository>,
    storage: Arc<dyn DatasetStorage>,
    privacy: PrivacyEnhancementEngine,
    utility: UtilityEvaluationEngine,
    audit: Option<Arc<AuditLogger>>,
}

impl PipelineOrchestrator {
    pub fn new(repository: Arc<dyn RunRepository>, storage: Arc<dyn DatasetStorage>) -> Self {
        Self {
            repository,
            storage,
            privacy: PrivacyEnhancementEngine::new(),
            utility: UtilityEvaluationEngine::new(),
            audit: None,
        }
    }

    /// Record lifecycle events to an audit log
    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn repository(&self) -> &Arc<dyn RunRepository> {
        &self.repository
    }

    /// Validate a request against its datasets and persist a new pending run
    ///
    /// # Errors
    ///
    /// - [`SafeDataError::NotFound`] if a dataset does not exist
    /// - [`SafeDataError::Configuration`] if the QI spec, privacy config or
    ///   auxiliary dataset does not fit the source table
    pub fn create_run(&self, request: RunRequest) -> Result<PipelineRun> {
        if request.risk_threshold == Some(0) {
            return Err(SafeDataError::Configuration(
                "Risk threshold must be at least 1".to_string(),
            ));
        }

        let table = self.storage.load_dataset(&request.dataset_id)?;
        request.qi_spec.validate_against(&table)?;
        request.config.validate_against(&table, &request.qi_spec)?;

        if let Some(aux_id) = &request.auxiliary_dataset_id {
            let auxiliary = self.storage.load_dataset(aux_id)?;
            if let Some(missing) = request
                .qi_spec
                .quasi_identifiers()
                .iter()
                .find(|c| !auxiliary.has_column(c))
            {
                return Err(SafeDataError::Configuration(format!(
                    "Auxiliary dataset '{aux_id}' is missing quasi-identifier '{missing}'"
                )));
            }
        }

        let run = PipelineRun::new(request);
        self.repository.insert(&run)?;

        tracing::info!(
            run_id = %run.id(),
            dataset_id = %run.request().dataset_id,
            technique = run.request().config.technique(),
            rows = table.row_count(),
            "Run created"
        );
        self.audit(AuditEvent::Created, &run, None);

        Ok(run)
    }

    /// Perform exactly one transition of a run and return its new status
    ///
    /// The run's lease is held for the whole call. A pending cancellation is
    /// checked before the stage starts and again after it finishes; in the
    /// second case the stage's artifact is discarded. The protected dataset
    /// is written to storage only once the utility stage survives that check.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Run to advance
    ///
    /// # Returns
    ///
    /// The status the run was persisted with. A stage failure is recorded on
    /// the run and reported as [`RunStatus::Failed`], not as an error.
    /// Terminal runs are returned unchanged, with any stale cancellation
    /// marker cleared.
    ///
    /// # Errors
    ///
    /// - [`SafeDataError::RunBusy`] if another context is advancing the run
    /// - [`SafeDataError::NotFound`] for an unknown run
    /// - repository errors while persisting
    pub fn advance(&self, run_id: RunId) -> Result<RunStatus> {
        let _lease = RunLease::acquire(Arc::clone(&self.repository), run_id)?;
        let mut run = self.repository.load(run_id)?;

        let stage = run.status();
        if stage.is_terminal() {
            // A cancel that lost the race with the final transition
            self.repository.clear_cancel(run_id)?;
            return Ok(stage);
        }

        if self.repository.is_cancel_requested(run_id)? {
            return self.apply_cancel(&mut run, stage);
        }

        crate::log_stage_start!(run_id, stage, run.attempt());
        let start = Instant::now();

        if let Err(e) = self.execute_stage(&mut run, stage) {
            return self.fail_run(&mut run, stage, &e);
        }

        // The stage ran to completion; honor a cancel that arrived meanwhile
        if self.repository.is_cancel_requested(run_id)? {
            run.discard_stage_artifact(stage);
            return self.apply_cancel(&mut run, stage);
        }

        if stage == RunStatus::EvaluatingUtility {
            if let Err(e) = self.persist_protected(&mut run) {
                return self.fail_run(&mut run, stage, &e);
            }
        }

        let next = run.advance_status()?;
        self.repository.save(&run)?;
        if next.is_terminal() {
            self.repository.clear_cancel(run_id)?;
        }

        crate::log_stage_complete!(run_id, stage, next, start.elapsed());
        self.audit(AuditEvent::Transition, &run, Some(stage));

        if next == RunStatus::Completed {
            tracing::info!(
                run_id = %run_id,
                attempt = run.attempt(),
                checksum = run.protected_checksum().unwrap_or_default(),
                "Run completed"
            );
        }

        Ok(next)
    }

    /// Advance until the run is terminal and return its final state
    ///
    /// # Errors
    ///
    /// Same as [`advance`](Self::advance).
    pub fn run_to_completion(&self, run_id: RunId) -> Result<PipelineRun> {
        loop {
            if self.advance(run_id)?.is_terminal() {
                return self.repository.load(run_id);
            }
        }
    }

    /// Ask a run to stop at its next transition boundary
    ///
    /// If no context is currently advancing the run, the cancellation is
    /// applied immediately. Terminal runs are left untouched.
    pub fn request_cancel(&self, run_id: RunId) -> Result<RunStatus> {
        let run = self.repository.load(run_id)?;
        if run.is_terminal() {
            return Ok(run.status());
        }

        self.repository.request_cancel(run_id)?;
        tracing::info!(run_id = %run_id, status = %run.status(), "Cancellation requested");
        self.audit(AuditEvent::CancelRequested, &run, None);

        match RunLease::acquire(Arc::clone(&self.repository), run_id) {
            Ok(_lease) => {
                let mut run = self.repository.load(run_id)?;
                if run.is_terminal() {
                    self.repository.clear_cancel(run_id)?;
                    return Ok(run.status());
                }
                let stage = run.status();
                self.apply_cancel(&mut run, stage)
            }
            // The advancing context picks the flag up after its stage
            Err(SafeDataError::RunBusy(_)) => {
                let current = self.repository.load(run_id)?;
                if current.is_terminal() {
                    self.repository.clear_cancel(run_id)?;
                }
                Ok(current.status())
            }
            Err(e) => Err(e),
        }
    }

    /// Restart a run that failed with an unsatisfiable k, using a new config
    ///
    /// The run keeps its id, its attempt counter increments and every stage
    /// from baseline risk assessment onwards runs again.
    ///
    /// # Errors
    ///
    /// - [`SafeDataError::State`] unless the run failed with
    ///   `UnsatisfiableKAnonymity`
    /// - [`SafeDataError::Configuration`] if the new config does not fit the dataset
    /// - [`SafeDataError::RunBusy`] if the run is leased
    pub fn retry_with_config(
        &self,
        run_id: RunId,
        config: PrivacyEnhancementConfig,
    ) -> Result<PipelineRun> {
        let _lease = RunLease::acquire(Arc::clone(&self.repository), run_id)?;
        let mut run = self.repository.load(run_id)?;

        let retryable = run.status() == RunStatus::Failed
            && run
                .failure()
                .is_some_and(|f| f.kind == ErrorKind::UnsatisfiableKAnonymity);
        if !retryable {
            return Err(SafeDataError::State(format!(
                "Run {run_id} cannot be retried in place (status {})",
                run.status()
            )));
        }

        let table = self.storage.load_dataset(&run.request().dataset_id)?;
        config.validate_against(&table, &run.request().qi_spec)?;

        let from = run.status();
        run.restart(config);
        self.repository.clear_cancel(run_id)?;
        self.repository.save(&run)?;

        tracing::info!(
            run_id = %run_id,
            attempt = run.attempt(),
            k = ?run.request().config.k(),
            "Run restarted with amended configuration"
        );
        self.audit(AuditEvent::Retried, &run, Some(from));

        Ok(run)
    }

    pub fn get_run(&self, run_id: RunId) -> Result<PipelineRun> {
        self.repository.load(run_id)
    }

    pub fn list_runs(&self) -> Result<Vec<PipelineRun>> {
        self.repository.list()
    }

    /// Report for a completed run
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::State`] unless the run is completed.
    pub fn report(&self, run_id: RunId) -> Result<PipelineReport> {
        PipelineReport::from_run(&self.repository.load(run_id)?)
    }

    fn execute_stage(&self, run: &mut PipelineRun, stage: RunStatus) -> Result<()> {
        let request = run.request().clone();

        match stage {
            RunStatus::Pending => Ok(()),
            RunStatus::RiskAssessingBaseline => {
                let table = self.storage.load_dataset(&request.dataset_id)?;
                let auxiliary = self.load_auxiliary(run)?;
                let metrics = RiskAssessmentEngine::with_threshold(run.risk_threshold()).assess(
                    &table,
                    &request.qi_spec,
                    auxiliary.as_ref(),
                )?;
                run.set_baseline_risk(metrics);
                Ok(())
            }
            RunStatus::Enhancing => {
                let table = self.storage.load_dataset(&request.dataset_id)?;
                let result = self
                    .privacy
                    .enhance(&table, &request.qi_spec, &request.config)?;
                let checksum = table_checksum(&result.table)?;
                run.set_protected(result.table, result.summary, result.recoding, checksum);
                Ok(())
            }
            RunStatus::RiskAssessingProtected => {
                let protected = protected_table(run)?;
                // Linkage runs against the auxiliary data as the attacker would
                // see it after the same recoding
                let auxiliary = match (self.load_auxiliary(run)?, run.recoding()) {
                    (Some(aux), Some(recoding)) => Some(recoding.apply(&aux)?),
                    (aux, _) => aux,
                };
                let metrics = RiskAssessmentEngine::with_threshold(run.risk_threshold()).assess(
                    protected,
                    &request.qi_spec,
                    auxiliary.as_ref(),
                )?;
                run.set_protected_risk(metrics);
                Ok(())
            }
            RunStatus::EvaluatingUtility => {
                let original = self.storage.load_dataset(&request.dataset_id)?;
                let protected = protected_table(run)?;
                let metrics = self.utility.evaluate_with_summary(
                    &original,
                    protected,
                    run.privacy_summary(),
                )?;
                run.set_utility_metrics(metrics);
                Ok(())
            }
            RunStatus::Completed | RunStatus::Failed => Err(SafeDataError::State(format!(
                "Run {} has no stage to execute in status {stage}",
                run.id()
            ))),
        }
    }

    fn persist_protected(&self, run: &mut PipelineRun) -> Result<()> {
        let handle = self
            .storage
            .save_protected_dataset(run.id(), protected_table(run)?)?;
        run.set_protected_dataset(handle);
        Ok(())
    }

    fn load_auxiliary(&self, run: &PipelineRun) -> Result<Option<DatasetTable>> {
        run.request()
            .auxiliary_dataset_id
            .as_ref()
            .map(|id| self.storage.load_dataset(id))
            .transpose()
    }

    fn fail_run(
        &self,
        run: &mut PipelineRun,
        stage: RunStatus,
        error: &SafeDataError,
    ) -> Result<RunStatus> {
        crate::log_error_with_context!(error, "Pipeline stage failed");
        tracing::warn!(
            run_id = %run.id(),
            stage = %stage,
            kind = %error.kind(),
            retryable = error.is_retryable(),
            "Run failed"
        );

        run.fail(RunFailure::from_error(stage, error));
        self.repository.save(run)?;
        self.repository.clear_cancel(run.id())?;
        self.audit(AuditEvent::Transition, run, Some(stage));
        Ok(RunStatus::Failed)
    }

    fn apply_cancel(&self, run: &mut PipelineRun, stage: RunStatus) -> Result<RunStatus> {
        run.fail(RunFailure::cancelled(stage));
        self.repository.save(run)?;
        self.repository.clear_cancel(run.id())?;

        tracing::info!(run_id = %run.id(), stage = %stage, "Run cancelled");
        self.audit(AuditEvent::Transition, run, Some(stage));
        Ok(RunStatus::Failed)
    }

    fn audit(&self, event: AuditEvent, run: &PipelineRun, from: Option<RunStatus>) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.record(event, run, from) {
                tracing::warn!(run_id = %run.id(), error = %e, "Failed to write audit entry");
            }
        }
    }
}

fn protected_table(run: &PipelineRun) -> Result<&DatasetTable> {
    run.protected_table().ok_or_else(|| {
        SafeDataError::State(format!("Run {} has no protected table", run.id()))
    })
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("storage", &self.storage.backend_name())
            .field("audit", &self.audit.is_some())
            .finish()
    }
}
