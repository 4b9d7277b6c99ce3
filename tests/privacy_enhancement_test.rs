//! Integration tests for k-anonymity and differential privacy enhancement

mod common;

use common::{decade_zip3_params, patients, patients_qi};
use safedata::domain::{find_metric, Column, DatasetTable, ErrorKind, QuasiIdentifierSpec, Value};
use safedata::privacy::{
    DifferentialPrivacyParams, EquivalenceClasses, GeneralizationHierarchy, KAnonymityParams,
    NoiseMechanism, PrivacyEnhancementConfig, PrivacyEnhancementEngine, PrivacySummary,
};
use safedata::risk::engine::{K_ANONYMITY_VIOLATIONS, SAMPLE_UNIQUENESS};
use safedata::risk::RiskAssessmentEngine;

#[test]
fn test_k_anonymity_removes_all_violations() {
    let table = patients();
    let qi = patients_qi();
    let risk = RiskAssessmentEngine::with_threshold(5);

    let baseline = risk.assess(&table, &qi, None).unwrap();
    assert_eq!(find_metric(&baseline, SAMPLE_UNIQUENESS).unwrap().value(), 1.0);
    assert_eq!(find_metric(&baseline, K_ANONYMITY_VIOLATIONS).unwrap().value(), 1.0);

    let config = PrivacyEnhancementConfig::KAnonymity(decade_zip3_params(5));
    let result = PrivacyEnhancementEngine::new()
        .enhance(&table, &qi, &config)
        .unwrap();

    let after = risk.assess(&result.table, &qi, None).unwrap();
    let violations = find_metric(&after, K_ANONYMITY_VIOLATIONS).unwrap();
    assert_eq!(violations.value(), 0.0);
    assert_eq!(violations.details().unwrap()["count"], 0);

    let PrivacySummary::KAnonymity(summary) = &result.summary else {
        panic!("expected a k-anonymity summary");
    };
    assert_eq!(summary.k, 5);
    assert_eq!(summary.suppressed_rows, 0);
    assert!(summary.min_class_size >= 5);
    assert_eq!(summary.class_count, 10);
}

#[test]
fn test_k_anonymity_generalizes_only_quasi_identifiers() {
    let table = patients();
    let config = PrivacyEnhancementConfig::KAnonymity(decade_zip3_params(5));
    let result = PrivacyEnhancementEngine::new()
        .enhance(&table, &patients_qi(), &config)
        .unwrap();

    assert_eq!(result.table.row_count(), table.row_count());
    assert_eq!(result.table.column("diagnosis"), table.column("diagnosis"));
    assert_eq!(
        result.table.value(0, "age"),
        Some(&Value::Text("[20, 30)".to_string()))
    );
    assert_eq!(
        result.table.value(0, "zip"),
        Some(&Value::Text("130**".to_string()))
    );
    assert_eq!(
        result.table.value(99, "zip"),
        Some(&Value::Text("148**".to_string()))
    );
    assert!(result.recoding.is_some());
}

#[test]
fn test_k_anonymity_is_deterministic() {
    let table = patients();
    let qi = patients_qi();
    let config = PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(4).unwrap());
    let engine = PrivacyEnhancementEngine::new();

    let first = engine.enhance(&table, &qi, &config).unwrap();
    let second = engine.enhance(&table, &qi, &config).unwrap();
    assert_eq!(first.table, second.table);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn test_k_larger_than_table_is_unsatisfiable() {
    let table = DatasetTable::new(vec![Column::numeric("age", [30, 40, 50]).unwrap()]).unwrap();
    let qi = QuasiIdentifierSpec::new(["age"], Vec::<String>::new()).unwrap();
    let config = PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(4).unwrap());

    let err = PrivacyEnhancementEngine::new()
        .enhance(&table, &qi, &config)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsatisfiableKAnonymity);
}

#[test]
fn test_differential_privacy_preserves_mean_of_large_column() {
    let table = DatasetTable::new(vec![
        Column::numeric("age", vec![50; 1000]).unwrap(),
        Column::categorical("sex", (0..1000).map(|i| if i % 2 == 0 { "f" } else { "m" }))
            .unwrap(),
    ])
    .unwrap();
    let qi = QuasiIdentifierSpec::new(["sex"], ["age"]).unwrap();
    let params = DifferentialPrivacyParams::new(1.0, 1.0)
        .unwrap()
        .with_seed(Some(42));
    let config = PrivacyEnhancementConfig::DifferentialPrivacy(params);

    let result = PrivacyEnhancementEngine::new()
        .enhance(&table, &qi, &config)
        .unwrap();

    let noisy: Vec<f64> = result.table.column("age").unwrap().numbers().collect();
    assert_eq!(noisy.len(), 1000);
    let mean = noisy.iter().sum::<f64>() / noisy.len() as f64;
    assert!((mean - 50.0).abs() < 0.5, "mean drifted to {mean}");
    assert!(noisy.iter().any(|&v| v != 50.0));

    // Categorical columns are untouched without randomized response
    assert_eq!(result.table.column("sex"), table.column("sex"));

    let PrivacySummary::DifferentialPrivacy(summary) = &result.summary else {
        panic!("expected a differential privacy summary");
    };
    assert_eq!(summary.seed, 42);
    assert!(summary.seed_was_fixed);
    assert_eq!(summary.noise_scales.get("age"), Some(&1.0));
}

#[test]
fn test_differential_privacy_same_seed_same_output() {
    let table = patients();
    let qi = patients_qi();
    let config = PrivacyEnhancementConfig::DifferentialPrivacy(
        DifferentialPrivacyParams::new(0.5, 2.0)
            .unwrap()
            .with_seed(Some(7)),
    );
    let engine = PrivacyEnhancementEngine::new();

    let first = engine.enhance(&table, &qi, &config).unwrap();
    let second = engine.enhance(&table, &qi, &config).unwrap();
    assert_eq!(first.table, second.table);
}

#[test]
fn test_differential_privacy_records_generated_seed() {
    let table = patients();
    let config = PrivacyEnhancementConfig::DifferentialPrivacy(
        DifferentialPrivacyParams::new(1.0, 1.0).unwrap(),
    );
    let result = PrivacyEnhancementEngine::new()
        .enhance(&table, &patients_qi(), &config)
        .unwrap();

    let PrivacySummary::DifferentialPrivacy(summary) = &result.summary else {
        panic!("expected a differential privacy summary");
    };
    assert!(!summary.seed_was_fixed);

    // Replaying the recorded seed reproduces the table
    let replay = PrivacyEnhancementConfig::DifferentialPrivacy(
        DifferentialPrivacyParams::new(1.0, 1.0)
            .unwrap()
            .with_seed(Some(summary.seed)),
    );
    let again = PrivacyEnhancementEngine::new()
        .enhance(&table, &patients_qi(), &replay)
        .unwrap();
    assert_eq!(again.table, result.table);
}

#[test]
fn test_differential_privacy_aggregate_mode_keeps_nulls() {
    let table = DatasetTable::new(vec![
        Column::numeric("income", [Value::Number(10.0), Value::Null, Value::Number(30.0)])
            .unwrap(),
        Column::categorical("region", ["north", "south", "north"]).unwrap(),
    ])
    .unwrap();
    let qi = QuasiIdentifierSpec::new(["region"], ["income"]).unwrap();
    let config = PrivacyEnhancementConfig::DifferentialPrivacy(
        DifferentialPrivacyParams::new(1.0, 1.0)
            .unwrap()
            .with_mechanism(NoiseMechanism::Aggregate)
            .with_seed(Some(1)),
    );

    let result = PrivacyEnhancementEngine::new()
        .enhance(&table, &qi, &config)
        .unwrap();

    assert_eq!(result.table.value(1, "income"), Some(&Value::Null));
    assert_eq!(
        result.table.value(0, "income"),
        result.table.value(2, "income")
    );

    let PrivacySummary::DifferentialPrivacy(summary) = &result.summary else {
        panic!("expected a differential privacy summary");
    };
    assert_eq!(summary.aggregates["income"].count, 2);
}

#[test]
fn test_generalization_never_increases_class_count() {
    let table = patients();
    let columns = vec!["age".to_string(), "zip".to_string()];
    let age = table.column("age").unwrap();
    let hierarchy = GeneralizationHierarchy::equal_width(age, 10).unwrap();

    let mut previous = usize::MAX;
    for level in 0..=hierarchy.max_level() {
        let generalized = table
            .with_column(hierarchy.generalize_column(age, level).unwrap())
            .unwrap();
        let classes = EquivalenceClasses::compute(&generalized, &columns)
            .unwrap()
            .len();
        assert!(classes <= previous, "level {level}: {classes} > {previous}");
        previous = classes;
    }
}
