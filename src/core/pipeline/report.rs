//! Report record for completed runs

use crate::core::pipeline::run::{PipelineRun, RunStatus};
use crate::domain::errors::SafeDataError;
use crate::domain::ids::{DatasetId, RunId};
use crate::domain::metric::{RiskMetric, UtilityMetric};
use crate::domain::Result;
use crate::privacy::summary::PrivacySummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk metrics before and after enhancement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskComparison {
    pub baseline: Vec<RiskMetric>,
    pub protected: Vec<RiskMetric>,
}

/// Everything a reporting surface needs for one completed run
///
/// Only built for `Completed` runs, so every field is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub dataset_id: DatasetId,
    pub technique: String,
    pub risk_metrics: RiskComparison,
    pub utility_metrics: Vec<UtilityMetric>,
    pub privacy_summary: PrivacySummary,
    /// Storage handle of the protected dataset
    pub protected_dataset: String,
    pub protected_checksum: String,
    pub attempt: u32,
    pub completed_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Assemble the report for a completed run
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::State`] if the run is not completed or an
    /// artifact is missing.
    pub fn from_run(run: &PipelineRun) -> Result<Self> {
        if run.status() != RunStatus::Completed {
            return Err(SafeDataError::State(format!(
                "Run {} is {}; reports are only available for completed runs",
                run.id(),
                run.status()
            )));
        }

        let missing = |what: &str| {
            SafeDataError::State(format!("Completed run {} has no {what}", run.id()))
        };

        Ok(Self {
            run_id: run.id(),
            dataset_id: run.request().dataset_id.clone(),
            technique: run.request().config.technique().to_string(),
            risk_metrics: RiskComparison {
                baseline: run
                    .baseline_risk()
                    .ok_or_else(|| missing("baseline risk"))?
                    .to_vec(),
                protected: run
                    .protected_risk()
                    .ok_or_else(|| missing("protected risk"))?
                    .to_vec(),
            },
            utility_metrics: run
                .utility_metrics()
                .ok_or_else(|| missing("utility metrics"))?
                .to_vec(),
            privacy_summary: run
                .privacy_summary()
                .cloned()
                .ok_or_else(|| missing("privacy summary"))?,
            protected_dataset: run
                .protected_dataset()
                .ok_or_else(|| missing("protected dataset"))?
                .to_string(),
            protected_checksum: run
                .protected_checksum()
                .ok_or_else(|| missing("checksum"))?
                .to_string(),
            attempt: run.attempt(),
            completed_at: run.completed_at().ok_or_else(|| missing("completion time"))?,
        })
    }
}
