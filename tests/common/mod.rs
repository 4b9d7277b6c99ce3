//! Shared fixtures for integration tests

#![allow(dead_code)]

use safedata::adapters::storage::InMemoryDatasetStorage;
use safedata::core::pipeline::{PipelineOrchestrator, RunRequest};
use safedata::core::state::InMemoryRunRepository;
use safedata::domain::{Column, DatasetId, DatasetTable, QuasiIdentifierSpec};
use safedata::privacy::{HierarchySpec, KAnonymityParams, PrivacyEnhancementConfig};
use std::sync::Arc;

/// 100 patients: ages 20..69 twice, first half in zip 130xx, second half in 148xx
///
/// Every (age, zip) combination is unique; generalizing age to decades and zip
/// to three digits leaves ten classes of ten.
pub fn patients() -> DatasetTable {
    let ages: Vec<i32> = (0..100).map(|i| 20 + (i % 50)).collect();
    let zips: Vec<String> = (0..100)
        .map(|i| {
            if i < 50 {
                format!("130{:02}", i % 17)
            } else {
                format!("148{:02}", i % 13)
            }
        })
        .collect();
    let diagnoses: Vec<&str> = (0..100)
        .map(|i| ["flu", "cold", "asthma", "diabetes"][i % 4])
        .collect();

    DatasetTable::new(vec![
        Column::numeric("age", ages).unwrap(),
        Column::categorical("zip", zips).unwrap(),
        Column::categorical("diagnosis", diagnoses).unwrap(),
    ])
    .unwrap()
}

pub fn patients_qi() -> QuasiIdentifierSpec {
    QuasiIdentifierSpec::new(["age", "zip"], ["diagnosis"]).unwrap()
}

/// k-anonymity with decade intervals for age and 3-digit prefixes for zip
pub fn decade_zip3_params(k: usize) -> KAnonymityParams {
    KAnonymityParams::with_k(k)
        .unwrap()
        .with_hierarchy(HierarchySpec::Interval {
            column: "age".to_string(),
            widths: vec![10.0],
            origin: 0.0,
            suppress: false,
        })
        .unwrap()
        .with_hierarchy(HierarchySpec::Prefix {
            column: "zip".to_string(),
            lengths: vec![3],
            suppress: false,
        })
        .unwrap()
}

/// Eight rows; k = 9 can never be met
pub fn small_table() -> DatasetTable {
    DatasetTable::new(vec![
        Column::numeric("age", [30, 31, 32, 33, 45, 46, 47, 48]).unwrap(),
        Column::categorical(
            "diagnosis",
            ["flu", "flu", "cold", "flu", "cold", "cold", "flu", "cold"],
        )
        .unwrap(),
    ])
    .unwrap()
}

pub fn small_request(k: usize) -> RunRequest {
    RunRequest::new(
        DatasetId::new("small").unwrap(),
        QuasiIdentifierSpec::new(["age"], ["diagnosis"]).unwrap(),
        PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(k).unwrap()),
    )
}

pub fn patients_request(k: usize) -> RunRequest {
    RunRequest::new(
        DatasetId::new("patients").unwrap(),
        patients_qi(),
        PrivacyEnhancementConfig::KAnonymity(decade_zip3_params(k)),
    )
}

pub fn storage() -> InMemoryDatasetStorage {
    let storage = InMemoryDatasetStorage::new();
    storage.insert(DatasetId::new("patients").unwrap(), patients());
    storage.insert(DatasetId::new("small").unwrap(), small_table());
    storage
}

pub fn orchestrator() -> (PipelineOrchestrator, Arc<InMemoryRunRepository>, Arc<InMemoryDatasetStorage>) {
    let repository = Arc::new(InMemoryRunRepository::new());
    let storage = Arc::new(storage());
    let orchestrator = PipelineOrchestrator::new(repository.clone(), storage.clone());
    (orchestrator, repository, storage)
}
