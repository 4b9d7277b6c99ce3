//! Utility loss between an original table and its protected counterpart
//!
//! Every metric is normalized to `[0, 1]` with 0 meaning no loss, so
//! `evaluate(x, x)` reports zero on every metric. Column types are taken from
//! the original table: a numeric column that was generalized into interval
//! labels is still compared numerically, using interval midpoints.

use crate::domain::errors::SafeDataError;
use crate::domain::metric::UtilityMetric;
use crate::domain::table::{Column, ColumnKind, DatasetTable, Value};
use crate::domain::Result;
use crate::privacy::summary::PrivacySummary;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};

pub const MEAN_DISTORTION: &str = "mean_distortion";
pub const STD_DISTORTION: &str = "std_distortion";
pub const DISTRIBUTION_DISTANCE: &str = "distribution_distance";
pub const NUMERIC_DISTRIBUTION_DISTANCE: &str = "numeric_distribution_distance";
pub const RECORD_DISTORTION: &str = "record_distortion";
pub const CELL_MODIFICATION_RATE: &str = "cell_modification_rate";
pub const ROW_COUNT_DELTA: &str = "row_count_delta";
pub const INFORMATION_LOSS: &str = "information_loss";
pub const SUPPRESSION_RATE: &str = "suppression_rate";

const EPSILON: f64 = 1e-12;

/// Compares original and protected tables
#[derive(Debug, Clone, Default)]
pub struct UtilityEvaluationEngine;

impl UtilityEvaluationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Utility metrics for `protected` relative to `original`
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::SchemaMismatch`] when the column sets differ.
    pub fn evaluate(
        &self,
        original: &DatasetTable,
        protected: &DatasetTable,
    ) -> Result<Vec<UtilityMetric>> {
        check_columns(original, protected)?;

        let numeric: Vec<(&Column, &Column)> = paired(original, protected, ColumnKind::Numeric);
        let categorical: Vec<(&Column, &Column)> =
            paired(original, protected, ColumnKind::Categorical);

        let mut means = Map::new();
        let mut stds = Map::new();
        let mut shapes = Map::new();
        let mut records = Map::new();
        let mut absolute = Map::new();
        for (orig, prot) in &numeric {
            let before: Vec<f64> = orig.numbers().collect();
            let after: Vec<f64> = prot.values().iter().filter_map(numeric_value).collect();
            let (mean_loss, std_loss) = if after.is_empty() && !before.is_empty() {
                (1.0, 1.0)
            } else {
                (
                    relative_change(mean(&before), mean(&after)),
                    relative_change(std_dev(&before), std_dev(&after)),
                )
            };
            let deviation = record_deviation(orig, prot);
            means.insert(orig.name().to_string(), json!(mean_loss));
            stds.insert(orig.name().to_string(), json!(std_loss));
            shapes.insert(orig.name().to_string(), json!(ks_statistic(&before, &after)));
            records.insert(orig.name().to_string(), json!(deviation.relative));
            absolute.insert(orig.name().to_string(), json!(deviation.absolute));
        }

        let mut distances = Map::new();
        for (orig, prot) in &categorical {
            distances.insert(
                orig.name().to_string(),
                json!(total_variation_distance(orig, prot)),
            );
        }

        let (changed, compared) = modified_cells(original, protected);
        let modification_rate = if compared == 0 {
            0.0
        } else {
            changed as f64 / compared as f64
        };

        let row_delta = if original.row_count() == 0 {
            if protected.row_count() == 0 {
                0.0
            } else {
                1.0
            }
        } else {
            original.row_count().abs_diff(protected.row_count()) as f64
                / original.row_count() as f64
        };

        let metrics = vec![
            column_average(
                MEAN_DISTORTION,
                "Relative change in numeric column means",
                means,
            ),
            column_average(
                STD_DISTORTION,
                "Relative change in numeric column standard deviations",
                stds,
            ),
            column_average(
                DISTRIBUTION_DISTANCE,
                "Total variation distance of categorical distributions",
                distances,
            ),
            column_average(
                NUMERIC_DISTRIBUTION_DISTANCE,
                "Kolmogorov-Smirnov distance of numeric distributions",
                shapes,
            ),
            column_average(
                RECORD_DISTORTION,
                "Mean relative per-cell deviation of numeric columns",
                records.clone(),
            )
            .with_details(json!({
                "columns": JsonValue::Object(records),
                "mean_absolute_deviation": JsonValue::Object(absolute),
            })),
            UtilityMetric::new(
                CELL_MODIFICATION_RATE,
                clamp(modification_rate),
                "Fraction of cells whose value changed",
            )
            .with_details(json!({"changed_cells": changed, "compared_cells": compared})),
            UtilityMetric::new(
                ROW_COUNT_DELTA,
                clamp(row_delta),
                "Relative change in row count",
            )
            .with_details(json!({
                "original_rows": original.row_count(),
                "protected_rows": protected.row_count(),
            })),
        ];

        tracing::debug!(
            numeric_columns = numeric.len(),
            categorical_columns = categorical.len(),
            "Utility evaluated"
        );

        Ok(metrics)
    }

    /// [`evaluate`](Self::evaluate) plus information loss and suppression
    /// rate when the protected table came from k-anonymity
    ///
    /// # Arguments
    ///
    /// * `original` - Source table
    /// * `protected` - Output of the privacy stage
    /// * `summary` - Privacy summary of that stage, if known
    ///
    /// # Returns
    ///
    /// Every metric of [`evaluate`](Self::evaluate); with a k-anonymity
    /// summary also [`INFORMATION_LOSS`] and [`SUPPRESSION_RATE`].
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::SchemaMismatch`] when the column sets differ.
    pub fn evaluate_with_summary(
        &self,
        original: &DatasetTable,
        protected: &DatasetTable,
        summary: Option<&PrivacySummary>,
    ) -> Result<Vec<UtilityMetric>> {
        let mut metrics = self.evaluate(original, protected)?;

        if let Some(PrivacySummary::KAnonymity(summary)) = summary {
            let heights: Map<String, JsonValue> = summary
                .generalization
                .iter()
                .map(|(column, g)| (column.clone(), json!(g.height)))
                .collect();
            metrics.push(
                UtilityMetric::new(
                    INFORMATION_LOSS,
                    clamp(summary.information_loss()),
                    "Mean generalization height of quasi-identifiers",
                )
                .with_details(JsonValue::Object(heights)),
            );

            let rate = if original.row_count() == 0 {
                0.0
            } else {
                summary.suppressed_rows as f64 / original.row_count() as f64
            };
            metrics.push(
                UtilityMetric::new(SUPPRESSION_RATE, clamp(rate), "Fraction of suppressed records")
                    .with_details(json!({"suppressed_rows": summary.suppressed_rows})),
            );
        }

        Ok(metrics)
    }
}

fn check_columns(original: &DatasetTable, protected: &DatasetTable) -> Result<()> {
    let before: BTreeSet<&str> = original.column_names().into_iter().collect();
    let after: BTreeSet<&str> = protected.column_names().into_iter().collect();
    if before == after {
        return Ok(());
    }

    let missing: Vec<&str> = before.difference(&after).copied().collect();
    let extra: Vec<&str> = after.difference(&before).copied().collect();
    Err(SafeDataError::SchemaMismatch(format!(
        "Protected table columns differ from original (missing: [{}], unexpected: [{}])",
        missing.join(", "),
        extra.join(", ")
    )))
}

/// Column pairs whose original kind is `kind`
fn paired<'a>(
    original: &'a DatasetTable,
    protected: &'a DatasetTable,
    kind: ColumnKind,
) -> Vec<(&'a Column, &'a Column)> {
    original
        .columns()
        .iter()
        .filter(|c| c.kind() == kind)
        .filter_map(|c| protected.column(c.name()).map(|p| (c, p)))
        .collect()
}

/// Numeric reading of a protected cell: numbers, numeric text, or interval midpoints
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .or_else(|| interval_midpoint(s)),
        Value::Null => None,
    }
}

/// Midpoint of a `[lo, hi)` or `[lo, hi]` label
fn interval_midpoint(label: &str) -> Option<f64> {
    let inner = label
        .trim()
        .strip_prefix('[')?
        .strip_suffix(|c: char| c == ')' || c == ']')?;
    let (lo, hi) = inner.split_once(',')?;
    let lo: f64 = lo.trim().parse().ok()?;
    let hi: f64 = hi.trim().parse().ok()?;
    Some((lo + hi) / 2.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn relative_change(before: f64, after: f64) -> f64 {
    let diff = (after - before).abs();
    if before.abs() > EPSILON {
        clamp(diff / before.abs())
    } else {
        clamp(diff)
    }
}

fn clamp(value: f64) -> f64 {
    if value.is_nan() {
        1.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Per-cell deviation of one numeric column
struct RecordDeviation {
    /// Mean relative deviation; cells without a numeric counterpart count as 1
    relative: f64,
    /// Mean absolute deviation over cells numeric on both sides, in column units
    absolute: Option<f64>,
}

fn record_deviation(original: &Column, protected: &Column) -> RecordDeviation {
    let mut relative = Vec::new();
    let mut absolute = Vec::new();
    for (o, p) in original.values().iter().zip(protected.values()) {
        if o.is_null() && p.is_null() {
            continue;
        }
        match (o.as_f64(), numeric_value(p)) {
            (Some(before), Some(after)) => {
                relative.push(relative_change(before, after));
                absolute.push((after - before).abs());
            }
            _ => relative.push(1.0),
        }
    }

    RecordDeviation {
        relative: mean(&relative),
        absolute: (!absolute.is_empty()).then(|| mean(&absolute)),
    }
}

/// Two-sample Kolmogorov-Smirnov statistic: the largest gap between the two
/// empirical distribution functions
fn ks_statistic(before: &[f64], after: &[f64]) -> f64 {
    match (before.is_empty(), after.is_empty()) {
        (true, true) => return 0.0,
        (true, false) | (false, true) => return 1.0,
        (false, false) => {}
    }

    let mut a = before.to_vec();
    let mut b = after.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (mut i, mut j) = (0, 0);
    let mut gap: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        gap = gap.max((i as f64 / a.len() as f64 - j as f64 / b.len() as f64).abs());
    }
    clamp(gap)
}

fn total_variation_distance(original: &Column, protected: &Column) -> f64 {
    let before = frequencies(original);
    let after = frequencies(protected);
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    let distance = keys
        .into_iter()
        .map(|k| (before.get(k).copied().unwrap_or(0.0) - after.get(k).copied().unwrap_or(0.0)).abs())
        .sum::<f64>()
        / 2.0;
    clamp(distance)
}

fn frequencies(column: &Column) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, f64> = BTreeMap::new();
    for value in column.values() {
        *counts.entry(value.key()).or_default() += 1.0;
    }
    let total = column.len() as f64;
    if total > 0.0 {
        for count in counts.values_mut() {
            *count /= total;
        }
    }
    counts
}

fn modified_cells(original: &DatasetTable, protected: &DatasetTable) -> (usize, usize) {
    let rows = original.row_count().min(protected.row_count());
    let mut changed = 0;
    let mut compared = 0;
    for column in original.columns() {
        let Some(other) = protected.column(column.name()) else {
            continue;
        };
        for row in 0..rows {
            compared += 1;
            if column.values()[row].key() != other.values()[row].key() {
                changed += 1;
            }
        }
    }
    (changed, compared)
}

/// Average of per-column losses, with the per-column values as details
fn column_average(name: &str, label: &str, per_column: Map<String, JsonValue>) -> UtilityMetric {
    let values: Vec<f64> = per_column.values().filter_map(JsonValue::as_f64).collect();
    UtilityMetric::new(name, clamp(mean(&values)), label)
        .with_details(json!({ "columns": JsonValue::Object(per_column) }))
}
