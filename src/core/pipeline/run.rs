//! Pipeline run model
//!
//! A [`PipelineRun`] is the persisted record of one execution. Its status
//! names the next stage to execute; every stage's artifact is stored on the
//! run before the status moves on, so a run read from the repository at any
//! point can be resumed from where it stopped.

use crate::domain::errors::{ErrorKind, SafeDataError};
use crate::domain::ids::{DatasetId, RunId};
use crate::domain::metric::{RiskMetric, UtilityMetric};
use crate::domain::qi::QuasiIdentifierSpec;
use crate::domain::table::DatasetTable;
use crate::privacy::config::PrivacyEnhancementConfig;
use crate::privacy::hierarchy::Recoding;
use crate::privacy::summary::PrivacySummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run status
///
/// Non-terminal statuses advance strictly in declaration order; `Failed` is
/// reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, nothing executed yet
    Pending,
    /// Baseline risk assessment of the original table is next
    RiskAssessingBaseline,
    /// Privacy enhancement is next
    Enhancing,
    /// Risk assessment of the protected table is next
    RiskAssessingProtected,
    /// Utility evaluation and artifact assembly are next
    EvaluatingUtility,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::RiskAssessingBaseline => "risk_assessing_baseline",
            RunStatus::Enhancing => "enhancing",
            RunStatus::RiskAssessingProtected => "risk_assessing_protected",
            RunStatus::EvaluatingUtility => "evaluating_utility",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Successor on the success path
    pub fn next(&self) -> Option<RunStatus> {
        match self {
            RunStatus::Pending => Some(RunStatus::RiskAssessingBaseline),
            RunStatus::RiskAssessingBaseline => Some(RunStatus::Enhancing),
            RunStatus::Enhancing => Some(RunStatus::RiskAssessingProtected),
            RunStatus::RiskAssessingProtected => Some(RunStatus::EvaluatingUtility),
            RunStatus::EvaluatingUtility => Some(RunStatus::Completed),
            RunStatus::Completed | RunStatus::Failed => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Stage that was executing
    pub stage: RunStatus,
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl RunFailure {
    pub fn from_error(stage: RunStatus, error: &SafeDataError) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }

    pub fn cancelled(stage: RunStatus) -> Self {
        Self::from_error(stage, &SafeDataError::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

/// One status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: RunStatus,
    pub to: RunStatus,
    pub at: DateTime<Utc>,
}

/// Everything needed to create a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub dataset_id: DatasetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_dataset_id: Option<DatasetId>,
    pub qi_spec: QuasiIdentifierSpec,
    pub config: PrivacyEnhancementConfig,
    /// Class size below which rows count as k-anonymity violations;
    /// defaults to k for k-anonymity runs and 1 otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_threshold: Option<usize>,
}

impl RunRequest {
    pub fn new(
        dataset_id: DatasetId,
        qi_spec: QuasiIdentifierSpec,
        config: PrivacyEnhancementConfig,
    ) -> Self {
        Self {
            dataset_id,
            auxiliary_dataset_id: None,
            qi_spec,
            config,
            risk_threshold: None,
        }
    }

    pub fn with_auxiliary(mut self, dataset_id: DatasetId) -> Self {
        self.auxiliary_dataset_id = Some(dataset_id);
        self
    }

    pub fn with_risk_threshold(mut self, threshold: usize) -> Self {
        self.risk_threshold = Some(threshold);
        self
    }
}

/// Persisted state of one pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    id: RunId,
    request: RunRequest,
    status: RunStatus,
    #[serde(default)]
    attempt: u32,
    baseline_risk: Option<Vec<RiskMetric>>,
    protected_table: Option<DatasetTable>,
    privacy_summary: Option<PrivacySummary>,
    recoding: Option<Recoding>,
    protected_checksum: Option<String>,
    protected_risk: Option<Vec<RiskMetric>>,
    utility_metrics: Option<Vec<UtilityMetric>>,
    protected_dataset: Option<String>,
    failure: Option<RunFailure>,
    history: Vec<StatusTransition>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// New pending run
    pub fn new(request: RunRequest) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::generate(),
            request,
            status: RunStatus::Pending,
            attempt: 1,
            baseline_risk: None,
            protected_table: None,
            privacy_summary: None,
            recoding: None,
            protected_checksum: None,
            protected_risk: None,
            utility_metrics: None,
            protected_dataset: None,
            failure: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 1 for the original attempt, incremented by each in-place retry
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn baseline_risk(&self) -> Option<&[RiskMetric]> {
        self.baseline_risk.as_deref()
    }

    pub fn protected_table(&self) -> Option<&DatasetTable> {
        self.protected_table.as_ref()
    }

    pub fn privacy_summary(&self) -> Option<&PrivacySummary> {
        self.privacy_summary.as_ref()
    }

    pub fn recoding(&self) -> Option<&Recoding> {
        self.recoding.as_ref()
    }

    /// SHA-256 of the protected table
    pub fn protected_checksum(&self) -> Option<&str> {
        self.protected_checksum.as_deref()
    }

    pub fn protected_risk(&self) -> Option<&[RiskMetric]> {
        self.protected_risk.as_deref()
    }

    pub fn utility_metrics(&self) -> Option<&[UtilityMetric]> {
        self.utility_metrics.as_deref()
    }

    /// Storage handle of the saved protected dataset
    pub fn protected_dataset(&self) -> Option<&str> {
        self.protected_dataset.as_deref()
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    pub fn history(&self) -> &[StatusTransition] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    // Mutators are crate-private: only the orchestrator changes a run

    pub(crate) fn set_baseline_risk(&mut self, metrics: Vec<RiskMetric>) {
        self.baseline_risk = Some(metrics);
    }

    pub(crate) fn set_protected(
        &mut self,
        table: DatasetTable,
        summary: PrivacySummary,
        recoding: Option<Recoding>,
        checksum: String,
    ) {
        self.protected_table = Some(table);
        self.privacy_summary = Some(summary);
        self.recoding = recoding;
        self.protected_checksum = Some(checksum);
    }

    pub(crate) fn set_protected_risk(&mut self, metrics: Vec<RiskMetric>) {
        self.protected_risk = Some(metrics);
    }

    pub(crate) fn set_utility_metrics(&mut self, metrics: Vec<UtilityMetric>) {
        self.utility_metrics = Some(metrics);
    }

    pub(crate) fn set_protected_dataset(&mut self, handle: String) {
        self.protected_dataset = Some(handle);
    }

    /// Drop whatever the given stage produced
    pub(crate) fn discard_stage_artifact(&mut self, stage: RunStatus) {
        match stage {
            RunStatus::RiskAssessingBaseline => self.baseline_risk = None,
            RunStatus::Enhancing => {
                self.protected_table = None;
                self.privacy_summary = None;
                self.recoding = None;
                self.protected_checksum = None;
            }
            RunStatus::RiskAssessingProtected => self.protected_risk = None,
            RunStatus::EvaluatingUtility => {
                self.utility_metrics = None;
                self.protected_dataset = None;
            }
            RunStatus::Pending | RunStatus::Completed | RunStatus::Failed => {}
        }
    }

    /// Move to the next status on the success path
    pub(crate) fn advance_status(&mut self) -> Result<RunStatus, SafeDataError> {
        let next = self.status.next().ok_or_else(|| {
            SafeDataError::State(format!("Run {} is already {}", self.id, self.status))
        })?;
        self.record_transition(next);
        if next == RunStatus::Completed {
            self.completed_at = Some(self.updated_at);
        }
        Ok(next)
    }

    pub(crate) fn fail(&mut self, failure: RunFailure) {
        self.failure = Some(failure);
        self.record_transition(RunStatus::Failed);
        self.completed_at = Some(self.updated_at);
    }

    /// Restart a failed run with a new config, clearing every artifact
    pub(crate) fn restart(&mut self, config: PrivacyEnhancementConfig) {
        self.request.config = config;
        self.attempt += 1;
        self.baseline_risk = None;
        self.protected_table = None;
        self.privacy_summary = None;
        self.recoding = None;
        self.protected_checksum = None;
        self.protected_risk = None;
        self.utility_metrics = None;
        self.protected_dataset = None;
        self.failure = None;
        self.completed_at = None;
        self.record_transition(RunStatus::RiskAssessingBaseline);
    }

    fn record_transition(&mut self, to: RunStatus) {
        let now = Utc::now();
        self.history.push(StatusTransition {
            from: self.status,
            to,
            at: now,
        });
        self.status = to;
        self.updated_at = now;
    }

    /// Violation threshold for risk assessment
    pub fn risk_threshold(&self) -> usize {
        self.request
            .risk_threshold
            .or_else(|| self.request.config.k())
            .unwrap_or(1)
    }
}
