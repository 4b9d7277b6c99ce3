//! Quasi-identifier specification

use crate::domain::errors::SafeDataError;
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Columns designated as quasi-identifiers, plus sensitive attributes that
/// are never generalized
///
/// The two sets are disjoint and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQiSpec")]
pub struct QuasiIdentifierSpec {
    quasi_identifiers: Vec<String>,
    #[serde(default)]
    sensitive_attributes: Vec<String>,
}

#[derive(Deserialize)]
struct RawQiSpec {
    quasi_identifiers: Vec<String>,
    #[serde(default)]
    sensitive_attributes: Vec<String>,
}

impl TryFrom<RawQiSpec> for QuasiIdentifierSpec {
    type Error = SafeDataError;

    fn try_from(raw: RawQiSpec) -> Result<Self> {
        Self::new(raw.quasi_identifiers, raw.sensitive_attributes)
    }
}

impl QuasiIdentifierSpec {
    /// Create a spec
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::Configuration`] when the QI list is empty,
    /// a name repeats, or a name appears in both sets.
    pub fn new<Q, S>(quasi_identifiers: Q, sensitive_attributes: S) -> Result<Self>
    where
        Q: IntoIterator,
        Q::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let quasi_identifiers: Vec<String> =
            quasi_identifiers.into_iter().map(Into::into).collect();
        let sensitive_attributes: Vec<String> =
            sensitive_attributes.into_iter().map(Into::into).collect();

        if quasi_identifiers.is_empty() {
            return Err(SafeDataError::Configuration(
                "At least one quasi-identifier is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for name in quasi_identifiers.iter().chain(&sensitive_attributes) {
            if name.trim().is_empty() {
                return Err(SafeDataError::Configuration(
                    "Column names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(SafeDataError::Configuration(format!(
                    "Column '{name}' is listed more than once across quasi-identifiers and sensitive attributes"
                )));
            }
        }

        Ok(Self {
            quasi_identifiers,
            sensitive_attributes,
        })
    }

    pub fn quasi_identifiers(&self) -> &[String] {
        &self.quasi_identifiers
    }

    pub fn sensitive_attributes(&self) -> &[String] {
        &self.sensitive_attributes
    }

    pub fn is_quasi_identifier(&self, column: &str) -> bool {
        self.quasi_identifiers.iter().any(|q| q == column)
    }

    pub fn is_sensitive(&self, column: &str) -> bool {
        self.sensitive_attributes.iter().any(|s| s == column)
    }

    /// Check every named column exists in `table`
    pub fn validate_against(&self, table: &DatasetTable) -> Result<()> {
        let missing: Vec<&str> = self
            .quasi_identifiers
            .iter()
            .chain(&self.sensitive_attributes)
            .filter(|name| !table.has_column(name))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SafeDataError::Configuration(format!(
                "Columns not found in dataset: {}",
                missing.join(", ")
            )))
        }
    }
}
