//! Re-identification risk assessment
//!
//! Risk is measured on equivalence classes over the quasi-identifier columns
//! as they currently appear in the table (raw or generalized). An optional
//! auxiliary table stands in for attacker knowledge: each of its rows is
//! linked to the class with identical QI values.

use crate::domain::errors::SafeDataError;
use crate::domain::metric::RiskMetric;
use crate::domain::qi::QuasiIdentifierSpec;
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use crate::privacy::equivalence::EquivalenceClasses;
use serde_json::json;

pub const SAMPLE_UNIQUENESS: &str = "sample_uniqueness";
pub const K_ANONYMITY_VIOLATIONS: &str = "k_anonymity_violations";
pub const PROSECUTOR_RISK_MEAN: &str = "prosecutor_risk_mean";
pub const PROSECUTOR_RISK_MAX: &str = "prosecutor_risk_max";
pub const LINKAGE_RISK_MEAN: &str = "linkage_risk_mean";
pub const LINKAGE_RISK_MAX: &str = "linkage_risk_max";
pub const LINKAGE_UNIQUE_MATCH_RATE: &str = "linkage_unique_match_rate";

/// Computes risk metrics; pure and stateless apart from the violation threshold
#[derive(Debug, Clone)]
pub struct RiskAssessmentEngine {
    violation_threshold: usize,
}

impl Default for RiskAssessmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskAssessmentEngine {
    /// Engine with the default violation threshold of 1
    pub fn new() -> Self {
        Self {
            violation_threshold: 1,
        }
    }

    /// Count rows in classes smaller than `threshold` as violations
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            violation_threshold: threshold.max(1),
        }
    }

    pub fn violation_threshold(&self) -> usize {
        self.violation_threshold
    }

    /// Assess `table`, optionally simulating linkage with `auxiliary`
    ///
    /// # Arguments
    ///
    /// * `table` - Table as released, possibly generalized
    /// * `qi` - Columns that form the equivalence classes
    /// * `auxiliary` - Attacker's dataset, matched on the same QI columns
    ///
    /// # Returns
    ///
    /// Sample uniqueness, k-anonymity violations and prosecutor risk, plus
    /// the linkage metrics when `auxiliary` is given. All values lie in
    /// `[0, 1]`; an empty table reports zeros with `{"empty": true}` details.
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::Configuration`] if a QI column is missing from
    /// either table.
    pub fn assess(
        &self,
        table: &DatasetTable,
        qi: &QuasiIdentifierSpec,
        auxiliary: Option<&DatasetTable>,
    ) -> Result<Vec<RiskMetric>> {
        let columns = qi.quasi_identifiers();
        let classes = EquivalenceClasses::compute(table, columns)?;

        if let Some(aux) = auxiliary {
            let missing: Vec<&str> = columns
                .iter()
                .filter(|c| !aux.has_column(c))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(SafeDataError::Configuration(format!(
                    "Auxiliary dataset is missing quasi-identifiers: {}",
                    missing.join(", ")
                )));
            }
        }

        if table.is_empty() {
            tracing::debug!("Risk assessment on empty table");
            return Ok(self.empty_metrics(auxiliary.is_some()));
        }

        let mut metrics = self.class_metrics(&classes);
        if let Some(aux) = auxiliary {
            metrics.extend(linkage_metrics(&classes, aux, columns)?);
        }

        tracing::debug!(
            rows = table.row_count(),
            classes = classes.len(),
            metrics = metrics.len(),
            "Risk assessed"
        );

        Ok(metrics)
    }

    fn class_metrics(&self, classes: &EquivalenceClasses) -> Vec<RiskMetric> {
        let rows = classes.row_count() as f64;
        let sizes = classes.row_class_sizes();

        let unique = sizes.iter().filter(|&&s| s == 1).count();
        let violations = sizes
            .iter()
            .filter(|&&s| s < self.violation_threshold)
            .count();
        let prosecutor: Vec<f64> = sizes.iter().map(|&s| 1.0 / s as f64).collect();
        let prosecutor_mean = prosecutor.iter().sum::<f64>() / rows;
        let prosecutor_max = prosecutor.iter().copied().fold(0.0, f64::max);

        vec![
            RiskMetric::new(
                SAMPLE_UNIQUENESS,
                unique as f64 / rows,
                "Fraction of records unique on their quasi-identifiers",
            )
            .with_details(json!({
                "unique_rows": unique,
                "total_rows": classes.row_count(),
                "class_count": classes.len(),
                "min_class_size": classes.min_size(),
                "max_class_size": classes.max_size(),
                "average_class_size": classes.average_size(),
            })),
            RiskMetric::new(
                K_ANONYMITY_VIOLATIONS,
                violations as f64 / rows,
                "Fraction of records in classes below the k threshold",
            )
            .with_details(json!({
                "count": violations,
                "threshold": self.violation_threshold,
                "total_rows": classes.row_count(),
            })),
            RiskMetric::new(
                PROSECUTOR_RISK_MEAN,
                prosecutor_mean,
                "Mean probability of re-identifying a known member",
            ),
            RiskMetric::new(
                PROSECUTOR_RISK_MAX,
                prosecutor_max,
                "Highest probability of re-identifying a known member",
            ),
        ]
    }

    fn empty_metrics(&self, with_linkage: bool) -> Vec<RiskMetric> {
        let mut names = vec![
            SAMPLE_UNIQUENESS,
            K_ANONYMITY_VIOLATIONS,
            PROSECUTOR_RISK_MEAN,
            PROSECUTOR_RISK_MAX,
        ];
        if with_linkage {
            names.extend([
                LINKAGE_RISK_MEAN,
                LINKAGE_RISK_MAX,
                LINKAGE_UNIQUE_MATCH_RATE,
            ]);
        }
        names
            .into_iter()
            .map(|name| RiskMetric::new(name, 0.0, "No records").with_details(json!({"empty": true})))
            .collect()
    }
}

fn linkage_metrics(
    classes: &EquivalenceClasses,
    auxiliary: &DatasetTable,
    columns: &[String],
) -> Result<Vec<RiskMetric>> {
    let aux_keys: Vec<Vec<String>> = columns
        .iter()
        .map(|name| {
            auxiliary
                .column(name)
                .map(|c| c.values().iter().map(|v| v.key()).collect())
                .ok_or_else(|| {
                    SafeDataError::Configuration(format!(
                        "Quasi-identifier '{name}' not found in auxiliary dataset"
                    ))
                })
        })
        .collect::<Result<_>>()?;

    let aux_rows = auxiliary.row_count();
    let mut total = 0.0;
    let mut max: f64 = 0.0;
    let mut matched = 0usize;
    let mut unique_matches = 0usize;

    for row in 0..aux_rows {
        let key: Vec<String> = aux_keys.iter().map(|c| c[row].clone()).collect();
        if let Some(rows) = classes.lookup(&key) {
            let risk = 1.0 / rows.len() as f64;
            total += risk;
            max = max.max(risk);
            matched += 1;
            if rows.len() == 1 {
                unique_matches += 1;
            }
        }
    }

    let (mean, rate) = if aux_rows == 0 {
        (0.0, 0.0)
    } else {
        (total / aux_rows as f64, unique_matches as f64 / aux_rows as f64)
    };

    let details = json!({
        "auxiliary_rows": aux_rows,
        "matched_rows": matched,
        "unique_matches": unique_matches,
    });

    Ok(vec![
        RiskMetric::new(
            LINKAGE_RISK_MEAN,
            mean,
            "Mean re-identification probability of auxiliary records",
        )
        .with_details(details.clone()),
        RiskMetric::new(
            LINKAGE_RISK_MAX,
            max,
            "Highest re-identification probability of an auxiliary record",
        )
        .with_details(details.clone()),
        RiskMetric::new(
            LINKAGE_UNIQUE_MATCH_RATE,
            rate,
            "Fraction of auxiliary records matching exactly one record",
        )
        .with_details(details),
    ])
}
