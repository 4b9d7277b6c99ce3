//! Equivalence classes over quasi-identifier columns
//!
//! Classes are keyed by the canonical text form of each QI value and kept in
//! a `BTreeMap`, so iteration order (and everything derived from it) is
//! deterministic.

use crate::domain::errors::SafeDataError;
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use std::collections::BTreeMap;

/// Rows grouped by identical QI values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceClasses {
    classes: BTreeMap<Vec<String>, Vec<usize>>,
    row_count: usize,
}

impl EquivalenceClasses {
    /// Group the rows of `table` by the given columns
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::Configuration`] if a column is missing.
    pub fn compute(table: &DatasetTable, columns: &[String]) -> Result<Self> {
        let keyed = columns
            .iter()
            .map(|name| {
                table
                    .column(name)
                    .map(|c| c.values().iter().map(|v| v.key()).collect::<Vec<_>>())
                    .ok_or_else(|| {
                        SafeDataError::Configuration(format!(
                            "Quasi-identifier '{name}' not found in table"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_column_keys(&keyed, table.row_count()))
    }

    /// Group rows from pre-rendered per-column keys (`keys[column][row]`)
    pub fn from_column_keys<K: AsRef<[String]>>(keys: &[K], row_count: usize) -> Self {
        let mut classes: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
        for row in 0..row_count {
            let key: Vec<String> = keys
                .iter()
                .map(|column| column.as_ref()[row].clone())
                .collect();
            classes.entry(key).or_default().push(row);
        }
        Self { classes, row_count }
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Classes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&[String], &[usize])> {
        self.classes
            .iter()
            .map(|(key, rows)| (key.as_slice(), rows.as_slice()))
    }

    /// Rows sharing exactly this key
    pub fn lookup(&self, key: &[String]) -> Option<&[usize]> {
        self.classes.get(key).map(Vec::as_slice)
    }

    pub fn min_size(&self) -> Option<usize> {
        self.classes.values().map(Vec::len).min()
    }

    pub fn max_size(&self) -> Option<usize> {
        self.classes.values().map(Vec::len).max()
    }

    pub fn average_size(&self) -> f64 {
        if self.classes.is_empty() {
            0.0
        } else {
            self.row_count as f64 / self.classes.len() as f64
        }
    }

    /// Class size for every row, indexed by row
    pub fn row_class_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.row_count];
        for rows in self.classes.values() {
            for &row in rows {
                sizes[row] = rows.len();
            }
        }
        sizes
    }

    /// Number of classes smaller than `k`
    pub fn undersized_classes(&self, k: usize) -> usize {
        self.classes.values().filter(|rows| rows.len() < k).count()
    }

    /// Rows belonging to classes smaller than `k`, in row order
    pub fn undersized_rows(&self, k: usize) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .classes
            .values()
            .filter(|rows| rows.len() < k)
            .flatten()
            .copied()
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Whether every class has at least `k` rows
    pub fn satisfies(&self, k: usize) -> bool {
        self.classes.values().all(|rows| rows.len() >= k)
    }
}
