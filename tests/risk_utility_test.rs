//! Integration tests for risk assessment and utility evaluation

mod common;

use common::{decade_zip3_params, patients, patients_qi};
use safedata::domain::{find_metric, Column, DatasetTable, ErrorKind, QuasiIdentifierSpec};
use safedata::privacy::{
    DifferentialPrivacyParams, PrivacyEnhancementConfig, PrivacyEnhancementEngine,
};
use safedata::risk::engine::{
    K_ANONYMITY_VIOLATIONS, LINKAGE_RISK_MEAN, LINKAGE_UNIQUE_MATCH_RATE, PROSECUTOR_RISK_MAX,
    SAMPLE_UNIQUENESS,
};
use safedata::risk::RiskAssessmentEngine;
use safedata::utility::engine::{
    CELL_MODIFICATION_RATE, DISTRIBUTION_DISTANCE, INFORMATION_LOSS, MEAN_DISTORTION,
    NUMERIC_DISTRIBUTION_DISTANCE, RECORD_DISTORTION, ROW_COUNT_DELTA, SUPPRESSION_RATE,
};
use safedata::utility::UtilityEvaluationEngine;

#[test]
fn test_risk_metrics_are_probabilities() {
    let metrics = RiskAssessmentEngine::with_threshold(3)
        .assess(&patients(), &patients_qi(), Some(&patients()))
        .unwrap();

    assert!(!metrics.is_empty());
    for metric in &metrics {
        assert!(
            (0.0..=1.0).contains(&metric.value()),
            "{} = {}",
            metric.name(),
            metric.value()
        );
    }
}

#[test]
fn test_linkage_against_identical_auxiliary_is_certain() {
    let metrics = RiskAssessmentEngine::new()
        .assess(&patients(), &patients_qi(), Some(&patients()))
        .unwrap();

    assert_eq!(find_metric(&metrics, LINKAGE_RISK_MEAN).unwrap().value(), 1.0);
    assert_eq!(
        find_metric(&metrics, LINKAGE_UNIQUE_MATCH_RATE).unwrap().value(),
        1.0
    );
}

#[test]
fn test_risk_without_auxiliary_has_no_linkage_metrics() {
    let metrics = RiskAssessmentEngine::new()
        .assess(&patients(), &patients_qi(), None)
        .unwrap();
    assert!(find_metric(&metrics, LINKAGE_RISK_MEAN).is_none());
    assert_eq!(find_metric(&metrics, PROSECUTOR_RISK_MAX).unwrap().value(), 1.0);
}

#[test]
fn test_single_class_table_has_minimal_risk() {
    let table = DatasetTable::new(vec![
        Column::categorical("region", ["north"; 4]).unwrap(),
        Column::numeric("income", [10, 20, 30, 40]).unwrap(),
    ])
    .unwrap();
    let qi = QuasiIdentifierSpec::new(["region"], ["income"]).unwrap();

    let metrics = RiskAssessmentEngine::with_threshold(4)
        .assess(&table, &qi, None)
        .unwrap();
    assert_eq!(find_metric(&metrics, SAMPLE_UNIQUENESS).unwrap().value(), 0.0);
    assert_eq!(find_metric(&metrics, K_ANONYMITY_VIOLATIONS).unwrap().value(), 0.0);
    assert_eq!(find_metric(&metrics, PROSECUTOR_RISK_MAX).unwrap().value(), 0.25);
}

#[test]
fn test_auxiliary_missing_quasi_identifier_is_rejected() {
    let auxiliary =
        DatasetTable::new(vec![Column::numeric("age", [20, 21]).unwrap()]).unwrap();
    let err = RiskAssessmentEngine::new()
        .assess(&patients(), &patients_qi(), Some(&auxiliary))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_utility_of_identical_tables_is_lossless() {
    let table = patients();
    let metrics = UtilityEvaluationEngine::new()
        .evaluate(&table, &table)
        .unwrap();

    assert!(!metrics.is_empty());
    for metric in &metrics {
        assert_eq!(metric.value(), 0.0, "{} should be zero", metric.name());
    }
}

#[test]
fn test_utility_after_k_anonymity() {
    let table = patients();
    let config = PrivacyEnhancementConfig::KAnonymity(decade_zip3_params(5));
    let result = PrivacyEnhancementEngine::new()
        .enhance(&table, &patients_qi(), &config)
        .unwrap();

    let metrics = UtilityEvaluationEngine::new()
        .evaluate_with_summary(&table, &result.table, Some(&result.summary))
        .unwrap();

    for metric in &metrics {
        assert!(
            (0.0..=1.0).contains(&metric.value()),
            "{} = {}",
            metric.name(),
            metric.value()
        );
    }
    assert_eq!(find_metric(&metrics, ROW_COUNT_DELTA).unwrap().value(), 0.0);
    assert_eq!(find_metric(&metrics, SUPPRESSION_RATE).unwrap().value(), 0.0);
    assert!(find_metric(&metrics, CELL_MODIFICATION_RATE).unwrap().value() > 0.0);
    assert_eq!(find_metric(&metrics, INFORMATION_LOSS).unwrap().value(), 1.0);
}

#[test]
fn test_utility_rejects_schema_mismatch() {
    let original = patients();
    let protected =
        DatasetTable::new(vec![Column::numeric("age", vec![30; 100]).unwrap()]).unwrap();

    let err = UtilityEvaluationEngine::new()
        .evaluate(&original, &protected)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}

#[test]
fn test_utility_after_differential_privacy_on_constant_column() {
    let table = DatasetTable::new(vec![
        Column::categorical("region", (0..1000).map(|i| if i % 2 == 0 { "n" } else { "s" }))
            .unwrap(),
        Column::numeric("score", vec![50; 1000]).unwrap(),
    ])
    .unwrap();
    let qi = QuasiIdentifierSpec::new(["region"], ["score"]).unwrap();
    let config = PrivacyEnhancementConfig::DifferentialPrivacy(
        DifferentialPrivacyParams::new(1.0, 1.0)
            .unwrap()
            .with_seed(Some(3)),
    );
    let result = PrivacyEnhancementEngine::new()
        .enhance(&table, &qi, &config)
        .unwrap();

    let metrics = UtilityEvaluationEngine::new()
        .evaluate_with_summary(&table, &result.table, Some(&result.summary))
        .unwrap();

    assert!(find_metric(&metrics, MEAN_DISTORTION).unwrap().value() < 0.01);
    assert!(find_metric(&metrics, RECORD_DISTORTION).unwrap().value() > 0.0);
    assert_eq!(find_metric(&metrics, DISTRIBUTION_DISTANCE).unwrap().value(), 0.0);
    // k-anonymity metrics only accompany k-anonymity summaries
    assert!(find_metric(&metrics, INFORMATION_LOSS).is_none());
}

#[test]
fn test_shifted_numeric_only_table_reports_distribution_distance() {
    let original =
        DatasetTable::new(vec![Column::numeric("income", (0..50).collect::<Vec<i32>>()).unwrap()])
            .unwrap();
    let shifted = DatasetTable::new(vec![Column::numeric(
        "income",
        (0..50).map(|v| v + 100).collect::<Vec<i32>>(),
    )
    .unwrap()])
    .unwrap();

    let engine = UtilityEvaluationEngine::new();
    let metrics = engine.evaluate(&original, &shifted).unwrap();
    assert_eq!(
        find_metric(&metrics, NUMERIC_DISTRIBUTION_DISTANCE).unwrap().value(),
        1.0
    );
    let record = find_metric(&metrics, RECORD_DISTORTION).unwrap();
    assert_eq!(record.details().unwrap()["mean_absolute_deviation"]["income"], 100.0);

    let metrics = engine.evaluate(&original, &original).unwrap();
    assert_eq!(
        find_metric(&metrics, NUMERIC_DISTRIBUTION_DISTANCE).unwrap().value(),
        0.0
    );
}
