//! Privacy enhancement engine
//!
//! The [`PrivacyEnhancementEngine`] dispatches on the configured technique and
//! returns a new protected table; the input table is never modified.

use crate::domain::qi::QuasiIdentifierSpec;
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use crate::privacy::config::PrivacyEnhancementConfig;
use crate::privacy::summary::ProtectedResult;
use crate::privacy::{differential, kanonymity};
use std::time::Instant;

/// Applies k-anonymity or differential privacy to a table
///
/// The engine holds no state; one instance can serve any number of runs
/// concurrently.
///
/// # Examples
///
/// ```
/// use safedata::domain::{Column, DatasetTable, QuasiIdentifierSpec};
/// use safedata::privacy::{KAnonymityParams, PrivacyEnhancementConfig, PrivacyEnhancementEngine};
///
/// # fn example() -> safedata::domain::Result<()> {
/// let table = DatasetTable::new(vec![
///     Column::categorical("zip", ["02134", "02134", "02139", "02139"])?,
/// ])?;
/// let qi = QuasiIdentifierSpec::new(["zip"], Vec::<String>::new())?;
/// let config = PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2)?);
///
/// let result = PrivacyEnhancementEngine::new().enhance(&table, &qi, &config)?;
/// assert_eq!(result.table.row_count(), 4);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrivacyEnhancementEngine;

impl PrivacyEnhancementEngine {
    pub fn new() -> Self {
        Self
    }

    /// Produce a protected copy of `table`
    ///
    /// # Arguments
    ///
    /// * `table` - Source table, never modified
    /// * `qi` - Quasi-identifier and sensitive columns
    /// * `config` - Technique and its parameters
    ///
    /// # Returns
    ///
    /// A [`ProtectedResult`] with the new table and its privacy summary.
    ///
    /// # Errors
    ///
    /// - [`SafeDataError::Configuration`] for invalid parameters or columns
    /// - [`SafeDataError::UnsatisfiableKAnonymity`] when k cannot be reached
    ///
    /// [`SafeDataError::Configuration`]: crate::domain::SafeDataError::Configuration
    /// [`SafeDataError::UnsatisfiableKAnonymity`]: crate::domain::SafeDataError::UnsatisfiableKAnonymity
    pub fn enhance(
        &self,
        table: &DatasetTable,
        qi: &QuasiIdentifierSpec,
        config: &PrivacyEnhancementConfig,
    ) -> Result<ProtectedResult> {
        let start = Instant::now();
        config.validate_against(table, qi)?;

        tracing::debug!(
            technique = config.technique(),
            rows = table.row_count(),
            quasi_identifiers = qi.quasi_identifiers().len(),
            "Enhancing dataset"
        );

        let result = match config {
            PrivacyEnhancementConfig::KAnonymity(params) => {
                kanonymity::anonymize(table, qi, params)?
            }
            PrivacyEnhancementConfig::DifferentialPrivacy(params) => {
                differential::perturb(table, qi, params)?
            }
        };

        tracing::debug!(
            technique = config.technique(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Enhancement finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Column;
    use crate::domain::SafeDataError;
    use crate::privacy::config::{DifferentialPrivacyParams, KAnonymityParams};
    use crate::privacy::summary::PrivacySummary;

    fn table() -> DatasetTable {
        DatasetTable::new(vec![
            Column::numeric("age", [30, 31, 40, 41]).unwrap(),
            Column::numeric("income", [100, 200, 300, 400]).unwrap(),
        ])
        .unwrap()
    }

    fn qi() -> QuasiIdentifierSpec {
        QuasiIdentifierSpec::new(["age"], ["income"]).unwrap()
    }

    #[test]
    fn test_dispatches_k_anonymity() {
        let config = PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2).unwrap());
        let result = PrivacyEnhancementEngine::new()
            .enhance(&table(), &qi(), &config)
            .unwrap();
        assert!(matches!(result.summary, PrivacySummary::KAnonymity(_)));
        // Sensitive attributes are never generalized
        assert_eq!(result.table.column("income"), table().column("income"));
    }

    #[test]
    fn test_dispatches_differential_privacy() {
        let params = DifferentialPrivacyParams::new(1.0, 1.0)
            .unwrap()
            .with_seed(Some(5));
        let config = PrivacyEnhancementConfig::DifferentialPrivacy(params);
        let result = PrivacyEnhancementEngine::new()
            .enhance(&table(), &qi(), &config)
            .unwrap();
        assert!(matches!(
            result.summary,
            PrivacySummary::DifferentialPrivacy(_)
        ));
        assert!(result.recoding.is_none());
    }

    #[test]
    fn test_input_table_untouched() {
        let original = table();
        let config = PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(4).unwrap());
        let _ = PrivacyEnhancementEngine::new().enhance(&original, &qi(), &config);
        assert_eq!(original, table());
    }

    #[test]
    fn test_missing_qi_column() {
        let bad_qi = QuasiIdentifierSpec::new(["zip"], Vec::<String>::new()).unwrap();
        let config = PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2).unwrap());
        let result = PrivacyEnhancementEngine::new().enhance(&table(), &bad_qi, &config);
        assert!(matches!(result, Err(SafeDataError::Configuration(_))));
    }
}
