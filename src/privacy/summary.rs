//! Parameter summaries attached to protected tables

use crate::domain::table::DatasetTable;
use crate::privacy::config::NoiseMechanism;
use crate::privacy::hierarchy::Recoding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generalization applied to one quasi-identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnGeneralization {
    pub level: usize,
    pub max_level: usize,
    /// `level / max_level`
    pub height: f64,
}

/// Outcome of k-anonymity enhancement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KAnonymitySummary {
    pub k: usize,
    pub suppression_value: String,
    pub generalization: BTreeMap<String, ColumnGeneralization>,
    pub suppressed_rows: usize,
    pub class_count: usize,
    pub min_class_size: usize,
    pub average_class_size: f64,
    /// Number of single-level climbs taken
    pub iterations: usize,
}

impl KAnonymitySummary {
    /// Mean normalized generalization height across QI columns
    pub fn information_loss(&self) -> f64 {
        if self.generalization.is_empty() {
            0.0
        } else {
            self.generalization.values().map(|g| g.height).sum::<f64>()
                / self.generalization.len() as f64
        }
    }
}

/// Noisy aggregate released for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoisyAggregate {
    pub count: usize,
    pub noisy_sum: f64,
    pub noisy_mean: f64,
}

/// Outcome of differential-privacy enhancement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialPrivacySummary {
    pub epsilon: f64,
    pub sensitivity: f64,
    pub mechanism: NoiseMechanism,
    /// Seed actually used; generated when none was configured
    pub seed: u64,
    pub seed_was_fixed: bool,
    /// Laplace scale per perturbed numeric column
    pub noise_scales: BTreeMap<String, f64>,
    /// Keep probability per perturbed categorical column
    pub randomized_response: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregates: BTreeMap<String, NoisyAggregate>,
    pub excluded_columns: Vec<String>,
}

/// Summary of whichever technique produced a protected table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "technique", rename_all = "snake_case")]
pub enum PrivacySummary {
    KAnonymity(KAnonymitySummary),
    DifferentialPrivacy(DifferentialPrivacySummary),
}

impl PrivacySummary {
    pub fn technique(&self) -> &'static str {
        match self {
            PrivacySummary::KAnonymity(_) => "k_anonymity",
            PrivacySummary::DifferentialPrivacy(_) => "differential_privacy",
        }
    }
}

/// Protected table plus what was done to produce it
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedResult {
    pub table: DatasetTable,
    pub summary: PrivacySummary,
    /// QI recoding to apply to auxiliary data before linkage (k-anonymity only)
    pub recoding: Option<Recoding>,
}
