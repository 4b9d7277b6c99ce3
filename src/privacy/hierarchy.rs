//! Generalization hierarchies
//!
//! A [`GeneralizationHierarchy`] maps every raw value of one column to a
//! progressively coarser label. Level 0 is always the raw value; the last
//! level is the coarsest. Consecutive levels are checked for monotonicity at
//! construction: two values that share a label at level `L` must share a label
//! at every level above `L`.
//!
//! Hierarchies come from two places:
//! - caller-supplied [`HierarchySpec`] entries (taxonomies, interval widths,
//!   prefix masks)
//! - defaults derived from the data (equal-width binning for numeric columns,
//!   suppression for everything else)

use crate::domain::errors::SafeDataError;
use crate::domain::table::{format_number, Column, DatasetTable, Value};
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used for fully suppressed values and for values a taxonomy does not cover
pub const SUPPRESSED_LABEL: &str = "*";

/// Upper bound for equal-width bin counts
pub const MAX_BIN_COUNT: usize = 1 << 16;

/// A single generalization level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Level {
    /// Raw value
    Identity,
    /// Explicit value-to-label mapping; unmapped values become `*`
    Taxonomy { mapping: BTreeMap<String, String> },
    /// Fixed-width numeric intervals anchored at `origin`
    Interval { width: f64, origin: f64 },
    /// Keep the first `length` characters and mask the rest with `*`
    Prefix { length: usize },
    /// Equal-width bins over `[min, min + width * bins]`, merged `2^merge` at a time
    EqualWidth {
        min: f64,
        width: f64,
        bins: usize,
        merge: u32,
    },
    /// Everything becomes `*`
    Suppress,
}

impl Level {
    /// Generalize a single value
    ///
    /// Nulls stay null at every level except [`Level::Suppress`].
    pub fn apply(&self, value: &Value) -> Value {
        if value.is_null() && !matches!(self, Level::Suppress) {
            return Value::Null;
        }

        match self {
            Level::Identity => value.clone(),
            Level::Taxonomy { mapping } => Value::Text(
                mapping
                    .get(&value.key())
                    .cloned()
                    .unwrap_or_else(|| SUPPRESSED_LABEL.to_string()),
            ),
            Level::Interval { width, origin } => match numeric(value) {
                Some(n) => {
                    let lo = origin + ((n - origin) / width).floor() * width;
                    Value::Text(format!(
                        "[{}, {})",
                        format_bound(lo),
                        format_bound(lo + width)
                    ))
                }
                None => Value::Text(SUPPRESSED_LABEL.to_string()),
            },
            Level::Prefix { length } => {
                let text = value.key();
                let total = text.chars().count();
                let kept: String = text.chars().take(*length).collect();
                let masked = total.saturating_sub(*length);
                Value::Text(format!("{kept}{}", SUPPRESSED_LABEL.repeat(masked)))
            }
            Level::EqualWidth {
                min,
                width,
                bins,
                merge,
            } => match numeric(value) {
                Some(n) => Value::Text(equal_width_label(n, *min, *width, *bins, *merge)),
                None => Value::Text(SUPPRESSED_LABEL.to_string()),
            },
            Level::Suppress => Value::Text(SUPPRESSED_LABEL.to_string()),
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Value::Null => None,
    }
}

/// Round interval bounds so accumulated float error does not leak into labels
fn format_bound(x: f64) -> String {
    format_number((x * 1e6).round() / 1e6)
}

fn equal_width_label(n: f64, min: f64, width: f64, bins: usize, merge: u32) -> String {
    let last = bins.saturating_sub(1);
    let index = if width > 0.0 {
        let raw = ((n - min) / width).floor();
        if raw < 0.0 {
            0
        } else {
            (raw as usize).min(last)
        }
    } else {
        0
    };

    let group = index >> merge;
    let start = group << merge;
    let end = ((group + 1) << merge).min(bins.max(1));
    let lo = min + start as f64 * width;
    let hi = min + end as f64 * width;

    if end >= bins {
        format!("[{}, {}]", format_bound(lo), format_bound(hi))
    } else {
        format!("[{}, {})", format_bound(lo), format_bound(hi))
    }
}

/// Ordered generalization levels for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralizationHierarchy {
    column: String,
    levels: Vec<Level>,
}

impl GeneralizationHierarchy {
    /// Build a hierarchy from explicit levels
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::Configuration`] when level 0 is not the
    /// identity, a level is malformed, or two consecutive levels are not
    /// monotonic.
    pub fn new(column: impl Into<String>, levels: Vec<Level>) -> Result<Self> {
        let column = column.into();

        if levels.first() != Some(&Level::Identity) {
            return Err(SafeDataError::Configuration(format!(
                "Hierarchy for '{column}' must start with the identity level"
            )));
        }

        for (index, level) in levels.iter().enumerate().skip(1) {
            validate_level(&column, index, level, index + 1 == levels.len())?;
        }

        for (index, pair) in levels.windows(2).enumerate() {
            check_monotonic(&column, index + 1, &pair[0], &pair[1])?;
        }

        Ok(Self { column, levels })
    }

    /// Identity followed by suppression
    pub fn suppression(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            levels: vec![Level::Identity, Level::Suppress],
        }
    }

    /// Taxonomy levels, coarsest last
    pub fn taxonomy(
        column: impl Into<String>,
        mappings: Vec<BTreeMap<String, String>>,
    ) -> Result<Self> {
        let mut levels = vec![Level::Identity];
        levels.extend(mappings.into_iter().map(|mapping| Level::Taxonomy { mapping }));
        Self::new(column, levels)
    }

    /// Interval levels with the given widths, narrowest first
    pub fn intervals(column: impl Into<String>, widths: &[f64], origin: f64) -> Result<Self> {
        let mut levels = vec![Level::Identity];
        levels.extend(
            widths
                .iter()
                .map(|&width| Level::Interval { width, origin }),
        );
        Self::new(column, levels)
    }

    /// Prefix-masking levels, longest kept prefix first
    pub fn prefixes(column: impl Into<String>, lengths: &[usize]) -> Result<Self> {
        let mut levels = vec![Level::Identity];
        levels.extend(lengths.iter().map(|&length| Level::Prefix { length }));
        Self::new(column, levels)
    }

    /// Default numeric hierarchy derived from the column's range
    ///
    /// Level 1 splits `[min, max]` into `bin_count` equal-width bins; every
    /// following level merges neighbouring bins pairwise until a single bin
    /// covers the range. A column without numbers falls back to suppression.
    pub fn equal_width(column: &Column, bin_count: usize) -> Result<Self> {
        if bin_count == 0 || bin_count > MAX_BIN_COUNT {
            return Err(SafeDataError::Configuration(format!(
                "bin_count for '{}' must be between 1 and {MAX_BIN_COUNT}, got {bin_count}",
                column.name()
            )));
        }

        let (min, max) = column
            .numbers()
            .fold(None, |acc: Option<(f64, f64)>, n| match acc {
                None => Some((n, n)),
                Some((lo, hi)) => Some((lo.min(n), hi.max(n))),
            })
            .unwrap_or((0.0, 0.0));

        if column.numbers().next().is_none() {
            return Ok(Self::suppression(column.name()));
        }

        let width = (max - min) / bin_count as f64;
        let mut levels = vec![Level::Identity];
        let mut merge = 0u32;
        loop {
            levels.push(Level::EqualWidth {
                min,
                width,
                bins: bin_count,
                merge,
            });
            if (bin_count - 1) >> merge == 0 {
                break;
            }
            merge += 1;
        }

        Self::new(column.name(), levels)
    }

    /// Append a suppression level unless the hierarchy already ends in one
    pub fn with_suppression(mut self) -> Self {
        if self.levels.last() != Some(&Level::Suppress) {
            self.levels.push(Level::Suppress);
        }
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Index of the coarsest level
    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// Normalized height of a level in `[0, 1]`
    pub fn height(&self, level: usize) -> f64 {
        if self.max_level() == 0 {
            0.0
        } else {
            level.min(self.max_level()) as f64 / self.max_level() as f64
        }
    }

    /// Generalize one value; levels beyond the top clamp to the top
    pub fn apply(&self, level: usize, value: &Value) -> Value {
        self.levels[level.min(self.max_level())].apply(value)
    }

    /// Generalize a whole column
    ///
    /// Level 0 returns the column unchanged; higher levels produce a
    /// categorical column of labels.
    pub fn generalize_column(&self, column: &Column, level: usize) -> Result<Column> {
        if level == 0 {
            return Ok(column.clone());
        }
        Column::categorical(
            column.name(),
            column.values().iter().map(|v| self.apply(level, v)),
        )
    }
}

fn validate_level(column: &str, index: usize, level: &Level, is_last: bool) -> Result<()> {
    let invalid = |reason: &str| {
        Err(SafeDataError::Configuration(format!(
            "Hierarchy for '{column}' level {index}: {reason}"
        )))
    };

    match level {
        Level::Identity => invalid("identity is only allowed at level 0"),
        Level::Suppress if !is_last => invalid("suppression must be the last level"),
        Level::Interval { width, origin } if !(width.is_finite() && *width > 0.0) || !origin.is_finite() => {
            invalid("interval width must be a positive finite number")
        }
        Level::EqualWidth { min, width, bins, .. }
            if *bins == 0 || !min.is_finite() || !width.is_finite() || *width < 0.0 =>
        {
            invalid("equal-width bins are malformed")
        }
        Level::Taxonomy { mapping } if mapping.is_empty() => invalid("taxonomy mapping is empty"),
        _ => Ok(()),
    }
}

fn check_monotonic(column: &str, index: usize, lower: &Level, upper: &Level) -> Result<()> {
    let not_monotonic = |reason: String| {
        Err(SafeDataError::Configuration(format!(
            "Hierarchy for '{column}' is not monotonic between levels {index} and {}: {reason}",
            index + 1
        )))
    };

    match (lower, upper) {
        (Level::Identity, _) | (_, Level::Suppress) => Ok(()),
        (
            Level::Interval {
                width: w1,
                origin: o1,
            },
            Level::Interval {
                width: w2,
                origin: o2,
            },
        ) => {
            let ratio = w2 / w1;
            if o1 != o2 {
                not_monotonic("interval origins differ".to_string())
            } else if ratio < 1.0 || (ratio - ratio.round()).abs() > 1e-9 {
                not_monotonic(format!(
                    "width {w2} is not an integer multiple of {w1}"
                ))
            } else {
                Ok(())
            }
        }
        (Level::Prefix { length: l1 }, Level::Prefix { length: l2 }) => {
            if l2 < l1 {
                Ok(())
            } else {
                not_monotonic(format!("prefix length {l2} must be shorter than {l1}"))
            }
        }
        (
            Level::EqualWidth {
                min: m1,
                width: w1,
                bins: b1,
                merge: g1,
            },
            Level::EqualWidth {
                min: m2,
                width: w2,
                bins: b2,
                merge: g2,
            },
        ) => {
            if m1 == m2 && w1 == w2 && b1 == b2 && g2 > g1 {
                Ok(())
            } else {
                not_monotonic("equal-width levels must share bins and merge further".to_string())
            }
        }
        (Level::Taxonomy { mapping: lower }, Level::Taxonomy { mapping: upper }) => {
            check_taxonomy(lower, upper).or_else(|reason| not_monotonic(reason))
        }
        _ => not_monotonic("level kinds cannot be combined".to_string()),
    }
}

/// Every group at the lower level must map to exactly one label above it
fn check_taxonomy(
    lower: &BTreeMap<String, String>,
    upper: &BTreeMap<String, String>,
) -> std::result::Result<(), String> {
    let label = |mapping: &BTreeMap<String, String>, raw: &str| {
        mapping
            .get(raw)
            .cloned()
            .unwrap_or_else(|| SUPPRESSED_LABEL.to_string())
    };

    let mut parents: BTreeMap<String, String> = BTreeMap::new();
    parents.insert(SUPPRESSED_LABEL.to_string(), SUPPRESSED_LABEL.to_string());

    for raw in lower.keys().chain(upper.keys()) {
        let child = label(lower, raw);
        let parent = label(upper, raw);
        match parents.get(&child) {
            Some(existing) if *existing != parent => {
                return Err(format!(
                    "group '{child}' maps to both '{existing}' and '{parent}'"
                ));
            }
            Some(_) => {}
            None => {
                parents.insert(child, parent);
            }
        }
    }
    Ok(())
}

/// Caller-supplied hierarchy definition as it appears in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HierarchySpec {
    /// One mapping per level, finest first
    Taxonomy {
        column: String,
        levels: Vec<BTreeMap<String, String>>,
        #[serde(default)]
        suppress: bool,
    },
    /// Interval widths, narrowest first
    Interval {
        column: String,
        widths: Vec<f64>,
        #[serde(default)]
        origin: f64,
        #[serde(default)]
        suppress: bool,
    },
    /// Kept prefix lengths, longest first
    Prefix {
        column: String,
        lengths: Vec<usize>,
        #[serde(default)]
        suppress: bool,
    },
    /// Raw value or `*`
    Suppression { column: String },
}

impl HierarchySpec {
    pub fn column(&self) -> &str {
        match self {
            HierarchySpec::Taxonomy { column, .. }
            | HierarchySpec::Interval { column, .. }
            | HierarchySpec::Prefix { column, .. }
            | HierarchySpec::Suppression { column } => column,
        }
    }

    /// Build and validate the hierarchy
    pub fn build(&self) -> Result<GeneralizationHierarchy> {
        let (hierarchy, suppress) = match self {
            HierarchySpec::Taxonomy {
                column,
                levels,
                suppress,
            } => (
                GeneralizationHierarchy::taxonomy(column.clone(), levels.clone())?,
                *suppress,
            ),
            HierarchySpec::Interval {
                column,
                widths,
                origin,
                suppress,
            } => (
                GeneralizationHierarchy::intervals(column.clone(), widths, *origin)?,
                *suppress,
            ),
            HierarchySpec::Prefix {
                column,
                lengths,
                suppress,
            } => (
                GeneralizationHierarchy::prefixes(column.clone(), lengths)?,
                *suppress,
            ),
            HierarchySpec::Suppression { column } => {
                (GeneralizationHierarchy::suppression(column.clone()), false)
            }
        };

        Ok(if suppress {
            hierarchy.with_suppression()
        } else {
            hierarchy
        })
    }
}

/// Hierarchy and chosen level per generalized column
///
/// Produced by k-anonymity so the same recoding can be applied to an
/// auxiliary dataset before linkage is measured against the protected table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recoding {
    columns: Vec<(GeneralizationHierarchy, usize)>,
}

impl Recoding {
    pub fn new(columns: Vec<(GeneralizationHierarchy, usize)>) -> Self {
        Self { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Chosen level for a column, if it is recoded
    pub fn level_of(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(h, _)| h.column() == column)
            .map(|(_, level)| *level)
    }

    /// Apply the recoding to another table with the same columns
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::Configuration`] if a recoded column is absent.
    pub fn apply(&self, table: &DatasetTable) -> Result<DatasetTable> {
        let replacements = self
            .columns
            .iter()
            .filter(|(_, level)| *level > 0)
            .map(|(hierarchy, level)| {
                let column = table.column(hierarchy.column()).ok_or_else(|| {
                    SafeDataError::Configuration(format!(
                        "Column '{}' not found in table",
                        hierarchy.column()
                    ))
                })?;
                hierarchy.generalize_column(column, *level)
            })
            .collect::<Result<Vec<_>>>()?;

        table.with_columns(replacements)
    }
}
