//! k-anonymity through generalization and suppression
//!
//! The search is a greedy climb over the generalization lattice. At each step
//! every QI column that can still be generalized is raised by one level on a
//! trial basis, and the column that removes the most undersized classes per
//! unit of normalized height is kept. Ties go to the smaller height step, then
//! to the column name, so the same input always yields the same output.
//!
//! If every column is fully generalized and some classes are still smaller than
//! k, the QI values of those rows are replaced by the suppression value. The
//! suppressed rows form one class, which must itself reach k; otherwise the
//! request fails with [`SafeDataError::UnsatisfiableKAnonymity`].

use crate::domain::errors::SafeDataError;
use crate::domain::qi::QuasiIdentifierSpec;
use crate::domain::table::{Column, ColumnKind, DatasetTable, Value};
use crate::domain::Result;
use crate::privacy::config::KAnonymityParams;
use crate::privacy::equivalence::EquivalenceClasses;
use crate::privacy::hierarchy::{GeneralizationHierarchy, Level, Recoding};
use crate::privacy::summary::{ColumnGeneralization, KAnonymitySummary, PrivacySummary, ProtectedResult};
use std::collections::BTreeMap;

/// One QI column with its hierarchy and pre-rendered keys per level
struct LatticeColumn<'a> {
    source: &'a Column,
    hierarchy: GeneralizationHierarchy,
    start_level: usize,
    /// `keys[level][row]`
    keys: Vec<Vec<String>>,
}

impl<'a> LatticeColumn<'a> {
    fn new(source: &'a Column, hierarchy: GeneralizationHierarchy, start_level: usize) -> Self {
        let keys = (0..=hierarchy.max_level())
            .map(|level| {
                source
                    .values()
                    .iter()
                    .map(|v| hierarchy.apply(level, v).key())
                    .collect()
            })
            .collect();
        Self {
            source,
            hierarchy,
            start_level,
            keys,
        }
    }

    fn name(&self) -> &str {
        self.source.name()
    }

    fn max_level(&self) -> usize {
        self.hierarchy.max_level()
    }
}

/// Generalization lattice over all QI columns
struct Lattice<'a> {
    columns: Vec<LatticeColumn<'a>>,
    /// Column indices sorted by name, for tie-breaking
    by_name: Vec<usize>,
    rows: usize,
}

impl<'a> Lattice<'a> {
    fn build(
        table: &'a DatasetTable,
        qi: &QuasiIdentifierSpec,
        params: &KAnonymityParams,
    ) -> Result<Self> {
        for spec in params.hierarchies() {
            if !qi.is_quasi_identifier(spec.column()) {
                return Err(SafeDataError::Configuration(format!(
                    "Hierarchy column '{}' is not a quasi-identifier",
                    spec.column()
                )));
            }
        }

        let columns = qi
            .quasi_identifiers()
            .iter()
            .map(|name| {
                let source = table.column(name).ok_or_else(|| {
                    SafeDataError::Configuration(format!(
                        "Quasi-identifier '{name}' not found in table"
                    ))
                })?;
                let (hierarchy, start_level) = select_hierarchy(source, params)?;
                Ok(LatticeColumn::new(source, hierarchy, start_level))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut by_name: Vec<usize> = (0..columns.len()).collect();
        by_name.sort_by(|&a, &b| columns[a].name().cmp(columns[b].name()));

        Ok(Self {
            columns,
            by_name,
            rows: table.row_count(),
        })
    }

    fn initial_levels(&self) -> Vec<usize> {
        self.columns.iter().map(|c| c.start_level).collect()
    }

    fn classes(&self, levels: &[usize]) -> EquivalenceClasses {
        let keys: Vec<&[String]> = self
            .columns
            .iter()
            .zip(levels)
            .map(|(column, &level)| column.keys[level].as_slice())
            .collect();
        EquivalenceClasses::from_column_keys(&keys, self.rows)
    }

    /// Column to raise next, or `None` when every column is at its top level
    fn best_climb(&self, levels: &[usize], current: &EquivalenceClasses, k: usize) -> Option<usize> {
        let before = current.undersized_classes(k);
        let mut best: Option<(usize, f64, f64)> = None;

        for &index in &self.by_name {
            let column = &self.columns[index];
            if levels[index] >= column.max_level() {
                continue;
            }

            let mut trial = levels.to_vec();
            trial[index] += 1;
            let after = self.classes(&trial).undersized_classes(k);

            let step = 1.0 / column.max_level() as f64;
            let score = before.saturating_sub(after) as f64 / step;

            tracing::trace!(
                column = column.name(),
                level = trial[index],
                undersized_before = before,
                undersized_after = after,
                score,
                "Evaluated generalization step"
            );

            let better = match best {
                None => true,
                Some((_, best_score, best_step)) => {
                    score > best_score || (score == best_score && step < best_step)
                }
            };
            if better {
                best = Some((index, score, step));
            }
        }

        best.map(|(index, _, _)| index)
    }
}

/// Caller hierarchy, equal-width bins for numeric columns, or plain suppression
fn select_hierarchy(
    column: &Column,
    params: &KAnonymityParams,
) -> Result<(GeneralizationHierarchy, usize)> {
    if let Some(spec) = params.hierarchy_for(column.name()) {
        return Ok((spec.build()?, 0));
    }

    if column.kind() == ColumnKind::Numeric && params.generalise_numeric() {
        let hierarchy = GeneralizationHierarchy::equal_width(column, params.bin_count())?;
        // Binned numeric columns always start at the finest bin level
        let start = match hierarchy.levels().get(1) {
            Some(Level::EqualWidth { .. }) => 1,
            _ => 0,
        };
        return Ok((hierarchy, start));
    }

    Ok((GeneralizationHierarchy::suppression(column.name()), 0))
}

/// Largest k' below `requested` reachable by suppressing undersized classes
fn achievable_k(classes: &EquivalenceClasses, requested: usize) -> usize {
    (1..requested)
        .rev()
        .find(|&candidate| {
            let leftover = classes.undersized_rows(candidate).len();
            leftover == 0 || leftover >= candidate
        })
        .unwrap_or(1)
}

/// Apply k-anonymity to `table`
///
/// Numeric QIs start binned when `generalise_numeric` is set; the QI whose
/// next level removes the most undersized classes per unit of height is
/// climbed until every class holds `k` rows or every QI is at its top level.
/// Rows still in undersized classes are then suppressed into one class.
///
/// # Arguments
///
/// * `table` - Source table, left untouched
/// * `qi` - Quasi-identifier and sensitive columns
/// * `params` - k, suppression label, binning and explicit hierarchies
///
/// # Returns
///
/// The protected table, a [`PrivacySummary::KAnonymity`] with per-column
/// levels and class statistics, and the [`Recoding`] that reproduces the
/// generalization on another table.
///
/// # Errors
///
/// - [`SafeDataError::Configuration`] if a QI column or hierarchy column is invalid
/// - [`SafeDataError::UnsatisfiableKAnonymity`] if k exceeds the row count or
///   the leftover rows after full generalization are fewer than k
pub fn anonymize(
    table: &DatasetTable,
    qi: &QuasiIdentifierSpec,
    params: &KAnonymityParams,
) -> Result<ProtectedResult> {
    qi.validate_against(table)?;

    let k = params.k();
    let rows = table.row_count();
    if k > rows {
        tracing::warn!(k, rows, "Requested k exceeds row count");
        return Err(SafeDataError::UnsatisfiableKAnonymity {
            requested: k,
            achievable: rows,
        });
    }

    let lattice = Lattice::build(table, qi, params)?;
    let mut levels = lattice.initial_levels();
    let mut classes = lattice.classes(&levels);
    let mut iterations = 0;

    while !classes.satisfies(k) {
        let Some(index) = lattice.best_climb(&levels, &classes, k) else {
            break;
        };
        levels[index] += 1;
        iterations += 1;
        classes = lattice.classes(&levels);

        tracing::debug!(
            column = lattice.columns[index].name(),
            level = levels[index],
            classes = classes.len(),
            undersized = classes.undersized_classes(k),
            "Generalized quasi-identifier"
        );
    }

    let suppressed = if classes.satisfies(k) {
        Vec::new()
    } else {
        let leftover = classes.undersized_rows(k);
        if leftover.len() < k {
            let achievable = achievable_k(&classes, k);
            tracing::warn!(
                k,
                achievable,
                leftover = leftover.len(),
                "k-anonymity unsatisfiable after full generalization"
            );
            return Err(SafeDataError::UnsatisfiableKAnonymity {
                requested: k,
                achievable,
            });
        }
        leftover
    };

    let mut is_suppressed = vec![false; rows];
    for &row in &suppressed {
        is_suppressed[row] = true;
    }

    let replacements = lattice
        .columns
        .iter()
        .zip(&levels)
        .filter(|(_, level)| **level > 0 || !suppressed.is_empty())
        .map(|(column, &level)| {
            let values = column.source.values().iter().enumerate().map(|(row, value)| {
                if is_suppressed[row] {
                    Value::Text(params.suppression_value().to_string())
                } else {
                    column.hierarchy.apply(level, value)
                }
            });
            Column::categorical(column.name(), values)
        })
        .collect::<Result<Vec<_>>>()?;

    let protected = table.with_columns(replacements)?;
    let final_classes = EquivalenceClasses::compute(&protected, qi.quasi_identifiers())?;

    let generalization: BTreeMap<String, ColumnGeneralization> = lattice
        .columns
        .iter()
        .zip(&levels)
        .map(|(column, &level)| {
            (
                column.name().to_string(),
                ColumnGeneralization {
                    level,
                    max_level: column.max_level(),
                    height: column.hierarchy.height(level),
                },
            )
        })
        .collect();

    let summary = KAnonymitySummary {
        k,
        suppression_value: params.suppression_value().to_string(),
        generalization,
        suppressed_rows: suppressed.len(),
        class_count: final_classes.len(),
        min_class_size: final_classes.min_size().unwrap_or(0),
        average_class_size: final_classes.average_size(),
        iterations,
    };

    tracing::info!(
        k,
        iterations,
        suppressed_rows = summary.suppressed_rows,
        classes = summary.class_count,
        min_class_size = summary.min_class_size,
        "k-anonymity applied"
    );

    let recoding = Recoding::new(
        lattice
            .columns
            .into_iter()
            .zip(levels)
            .map(|(column, level)| (column.hierarchy, level))
            .collect(),
    );

    Ok(ProtectedResult {
        table: protected,
        summary: PrivacySummary::KAnonymity(summary),
        recoding: Some(recoding),
    })
}
