//! Privacy enhancement configuration
//!
//! [`PrivacyEnhancementConfig`] is a tagged union: exactly one technique with
//! its own parameters. Parameters are validated when they are constructed or
//! deserialized, so an invalid config never reaches the engines.

use crate::domain::errors::SafeDataError;
use crate::domain::qi::QuasiIdentifierSpec;
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use crate::privacy::hierarchy::{HierarchySpec, MAX_BIN_COUNT, SUPPRESSED_LABEL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default number of equal-width bins for numeric quasi-identifiers
pub const DEFAULT_BIN_COUNT: usize = 10;

/// Privacy technique and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "technique", rename_all = "snake_case")]
pub enum PrivacyEnhancementConfig {
    KAnonymity(KAnonymityParams),
    DifferentialPrivacy(DifferentialPrivacyParams),
}

impl PrivacyEnhancementConfig {
    /// Technique name as used in configuration and reports
    pub fn technique(&self) -> &'static str {
        match self {
            PrivacyEnhancementConfig::KAnonymity(_) => "k_anonymity",
            PrivacyEnhancementConfig::DifferentialPrivacy(_) => "differential_privacy",
        }
    }

    /// Requested k, for k-anonymity configs
    pub fn k(&self) -> Option<usize> {
        match self {
            PrivacyEnhancementConfig::KAnonymity(params) => Some(params.k()),
            PrivacyEnhancementConfig::DifferentialPrivacy(_) => None,
        }
    }

    /// Check column references against a table and QI spec
    pub fn validate_against(&self, table: &DatasetTable, qi: &QuasiIdentifierSpec) -> Result<()> {
        match self {
            PrivacyEnhancementConfig::KAnonymity(params) => {
                for spec in params.hierarchies() {
                    if !qi.is_quasi_identifier(spec.column()) {
                        return Err(SafeDataError::Configuration(format!(
                            "Hierarchy column '{}' is not a quasi-identifier",
                            spec.column()
                        )));
                    }
                }
                Ok(())
            }
            PrivacyEnhancementConfig::DifferentialPrivacy(params) => {
                match params
                    .excluded_columns()
                    .iter()
                    .find(|c| !table.has_column(c))
                {
                    Some(missing) => Err(SafeDataError::Configuration(format!(
                        "Excluded column '{missing}' not found in dataset"
                    ))),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Parameters for k-anonymity via generalization and suppression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawKAnonymityParams")]
pub struct KAnonymityParams {
    k: usize,
    suppression_value: String,
    generalise_numeric: bool,
    bin_count: usize,
    hierarchies: Vec<HierarchySpec>,
}

#[derive(Deserialize)]
struct RawKAnonymityParams {
    k: usize,
    #[serde(default = "default_suppression_value")]
    suppression_value: String,
    #[serde(default = "default_true")]
    generalise_numeric: bool,
    #[serde(default = "default_bin_count")]
    bin_count: usize,
    #[serde(default)]
    hierarchies: Vec<HierarchySpec>,
}

fn default_suppression_value() -> String {
    SUPPRESSED_LABEL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_bin_count() -> usize {
    DEFAULT_BIN_COUNT
}

impl TryFrom<RawKAnonymityParams> for KAnonymityParams {
    type Error = SafeDataError;

    fn try_from(raw: RawKAnonymityParams) -> Result<Self> {
        let mut params = Self::new(
            raw.k,
            raw.suppression_value,
            raw.generalise_numeric,
            raw.bin_count,
        )?;
        for spec in raw.hierarchies {
            params = params.with_hierarchy(spec)?;
        }
        Ok(params)
    }
}

impl KAnonymityParams {
    /// Create validated parameters
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::Configuration`] when `k < 2`, when `bin_count`
    /// is zero or above [`MAX_BIN_COUNT`], or when the suppression value is
    /// empty.
    pub fn new(
        k: usize,
        suppression_value: impl Into<String>,
        generalise_numeric: bool,
        bin_count: usize,
    ) -> Result<Self> {
        let suppression_value = suppression_value.into();
        if k < 2 {
            return Err(SafeDataError::Configuration(format!(
                "k must be at least 2, got {k}"
            )));
        }
        if bin_count == 0 || bin_count > MAX_BIN_COUNT {
            return Err(SafeDataError::Configuration(format!(
                "bin_count must be between 1 and {MAX_BIN_COUNT}, got {bin_count}"
            )));
        }
        if suppression_value.is_empty() {
            return Err(SafeDataError::Configuration(
                "suppression_value cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            k,
            suppression_value,
            generalise_numeric,
            bin_count,
            hierarchies: Vec::new(),
        })
    }

    /// Defaults for everything but `k`
    pub fn with_k(k: usize) -> Result<Self> {
        Self::new(k, SUPPRESSED_LABEL, true, DEFAULT_BIN_COUNT)
    }

    /// Register a caller-supplied hierarchy
    ///
    /// The hierarchy is built once here so malformed definitions fail early.
    pub fn with_hierarchy(mut self, spec: HierarchySpec) -> Result<Self> {
        spec.build()?;
        if self.hierarchies.iter().any(|h| h.column() == spec.column()) {
            return Err(SafeDataError::Configuration(format!(
                "Duplicate hierarchy for column '{}'",
                spec.column()
            )));
        }
        self.hierarchies.push(spec);
        Ok(self)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn suppression_value(&self) -> &str {
        &self.suppression_value
    }

    pub fn generalise_numeric(&self) -> bool {
        self.generalise_numeric
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn hierarchies(&self) -> &[HierarchySpec] {
        &self.hierarchies
    }

    pub fn hierarchy_for(&self, column: &str) -> Option<&HierarchySpec> {
        self.hierarchies.iter().find(|h| h.column() == column)
    }

    /// Copy with a different k
    pub fn with_requested_k(&self, k: usize) -> Result<Self> {
        let mut params = Self::new(
            k,
            self.suppression_value.clone(),
            self.generalise_numeric,
            self.bin_count,
        )?;
        params.hierarchies = self.hierarchies.clone();
        Ok(params)
    }
}

/// Where Laplace noise is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMechanism {
    /// Independent noise on every numeric cell
    #[default]
    Record,
    /// Noise on each numeric column's sum; cells are replaced by the noisy mean
    Aggregate,
}

/// Parameters for the Laplace mechanism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDifferentialPrivacyParams")]
pub struct DifferentialPrivacyParams {
    epsilon: f64,
    sensitivity: f64,
    mechanism: NoiseMechanism,
    seed: Option<u64>,
    randomized_response: bool,
    excluded_columns: Vec<String>,
}

#[derive(Deserialize)]
struct RawDifferentialPrivacyParams {
    epsilon: f64,
    #[serde(default = "default_sensitivity")]
    sensitivity: f64,
    #[serde(default)]
    mechanism: NoiseMechanism,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    randomized_response: bool,
    #[serde(default)]
    excluded_columns: Vec<String>,
}

fn default_sensitivity() -> f64 {
    1.0
}

impl TryFrom<RawDifferentialPrivacyParams> for DifferentialPrivacyParams {
    type Error = SafeDataError;

    fn try_from(raw: RawDifferentialPrivacyParams) -> Result<Self> {
        Ok(Self::new(raw.epsilon, raw.sensitivity)?
            .with_mechanism(raw.mechanism)
            .with_seed(raw.seed)
            .with_randomized_response(raw.randomized_response)
            .with_excluded_columns(raw.excluded_columns))
    }
}

impl DifferentialPrivacyParams {
    /// Create validated parameters
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::Configuration`] unless both `epsilon` and
    /// `sensitivity` are finite and strictly positive.
    pub fn new(epsilon: f64, sensitivity: f64) -> Result<Self> {
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(SafeDataError::Configuration(format!(
                "epsilon must be a positive number, got {epsilon}"
            )));
        }
        if !(sensitivity.is_finite() && sensitivity > 0.0) {
            return Err(SafeDataError::Configuration(format!(
                "sensitivity must be a positive number, got {sensitivity}"
            )));
        }
        Ok(Self {
            epsilon,
            sensitivity,
            mechanism: NoiseMechanism::Record,
            seed: None,
            randomized_response: false,
            excluded_columns: Vec::new(),
        })
    }

    pub fn with_mechanism(mut self, mechanism: NoiseMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    /// Fix the random seed for reproducible output
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Perturb categorical columns with k-ary randomized response
    pub fn with_randomized_response(mut self, enabled: bool) -> Self {
        self.randomized_response = enabled;
        self
    }

    /// Columns left untouched (identifiers, keys)
    pub fn with_excluded_columns<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let unique: BTreeSet<String> = columns.into_iter().map(Into::into).collect();
        self.excluded_columns = unique.into_iter().collect();
        self
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn mechanism(&self) -> NoiseMechanism {
        self.mechanism
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn randomized_response(&self) -> bool {
        self.randomized_response
    }

    pub fn excluded_columns(&self) -> &[String] {
        &self.excluded_columns
    }

    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded_columns.iter().any(|c| c == column)
    }

    /// Laplace scale `b = sensitivity / epsilon`
    pub fn noise_scale(&self) -> f64 {
        self.sensitivity / self.epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0 ; "zero")]
    #[test_case(1 ; "one")]
    fn test_k_below_two_rejected(k: usize) {
        assert!(matches!(
            KAnonymityParams::with_k(k),
            Err(SafeDataError::Configuration(_))
        ));
    }

    #[test_case(0 ; "zero")]
    #[test_case(MAX_BIN_COUNT + 1 ; "above cap")]
    #[test_case(usize::MAX ; "usize max")]
    fn test_bin_count_out_of_range_rejected(bin_count: usize) {
        assert!(matches!(
            KAnonymityParams::new(5, "*", true, bin_count),
            Err(SafeDataError::Configuration(_))
        ));
    }

    #[test_case(0.0, 1.0 ; "zero epsilon")]
    #[test_case(-1.0, 1.0 ; "negative epsilon")]
    #[test_case(1.0, 0.0 ; "zero sensitivity")]
    #[test_case(f64::NAN, 1.0 ; "nan epsilon")]
    fn test_invalid_dp_params(epsilon: f64, sensitivity: f64) {
        assert!(matches!(
            DifferentialPrivacyParams::new(epsilon, sensitivity),
            Err(SafeDataError::Configuration(_))
        ));
    }

    #[test]
    fn test_noise_scale() {
        let params = DifferentialPrivacyParams::new(0.5, 2.0).unwrap();
        assert_eq!(params.noise_scale(), 4.0);
    }

    #[test]
    fn test_deserialize_k_anonymity_defaults() {
        let config: PrivacyEnhancementConfig =
            serde_json::from_str(r#"{"technique":"k_anonymity","k":3}"#).unwrap();
        let PrivacyEnhancementConfig::KAnonymity(params) = &config else {
            panic!("expected k-anonymity");
        };
        assert_eq!(params.k(), 3);
        assert_eq!(params.suppression_value(), "*");
        assert!(params.generalise_numeric());
        assert_eq!(params.bin_count(), DEFAULT_BIN_COUNT);
        assert_eq!(config.technique(), "k_anonymity");
        assert_eq!(config.k(), Some(3));
    }

    #[test]
    fn test_deserialize_rejects_invalid_epsilon() {
        let result: std::result::Result<PrivacyEnhancementConfig, _> =
            serde_json::from_str(r#"{"technique":"differential_privacy","epsilon":0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_dp_from_toml() {
        let config: PrivacyEnhancementConfig = toml::from_str(
            r#"
            technique = "differential_privacy"
            epsilon = 1.0
            mechanism = "aggregate"
            seed = 7
            excluded_columns = ["id"]
            "#,
        )
        .unwrap();
        let PrivacyEnhancementConfig::DifferentialPrivacy(params) = config else {
            panic!("expected differential privacy");
        };
        assert_eq!(params.mechanism(), NoiseMechanism::Aggregate);
        assert_eq!(params.seed(), Some(7));
        assert_eq!(params.sensitivity(), 1.0);
        assert!(params.is_excluded("id"));
    }

    #[test]
    fn test_duplicate_hierarchy_rejected() {
        let spec = HierarchySpec::Suppression {
            column: "zip".to_string(),
        };
        let params = KAnonymityParams::with_k(2)
            .unwrap()
            .with_hierarchy(spec.clone())
            .unwrap();
        assert!(params.with_hierarchy(spec).is_err());
    }

    #[test]
    fn test_hierarchy_must_target_quasi_identifier() {
        let table = DatasetTable::new(vec![
            crate::domain::table::Column::numeric("age", [1]).unwrap(),
            crate::domain::table::Column::categorical("zip", ["1"]).unwrap(),
        ])
        .unwrap();
        let qi = QuasiIdentifierSpec::new(["age"], ["zip"]).unwrap();
        let params = KAnonymityParams::with_k(2)
            .unwrap()
            .with_hierarchy(HierarchySpec::Suppression {
                column: "zip".to_string(),
            })
            .unwrap();
        let config = PrivacyEnhancementConfig::KAnonymity(params);
        assert!(config.validate_against(&table, &qi).is_err());
    }
}
