//! Integration tests for the pipeline state machine
//!
//! These tests verify that:
//! - Every run passes through every stage in order
//! - Concurrent advancement fails fast instead of blocking
//! - Cancellation takes effect at stage boundaries
//! - Unsatisfiable k-anonymity runs can be retried in place
//! - Runs persisted to disk resume in a fresh orchestrator

mod common;

use common::{orchestrator, patients_request, small_request, storage};
use safedata::adapters::storage::FileDatasetStorage;
use safedata::audit::AuditLogger;
use safedata::core::pipeline::{PipelineOrchestrator, RunStatus};
use safedata::core::state::{FileRunRepository, RunRepository};
use safedata::domain::{find_metric, DatasetId, ErrorKind, SafeDataError};
use safedata::privacy::{KAnonymityParams, PrivacyEnhancementConfig};
use safedata::risk::engine::K_ANONYMITY_VIOLATIONS;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_run_visits_every_stage_in_order() {
    let (orchestrator, _, storage) = orchestrator();
    let run = orchestrator.create_run(patients_request(5)).unwrap();
    assert_eq!(run.status(), RunStatus::Pending);

    let run = orchestrator.run_to_completion(run.id()).unwrap();
    assert_eq!(run.status(), RunStatus::Completed);

    let path: Vec<(RunStatus, RunStatus)> =
        run.history().iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        path,
        vec![
            (RunStatus::Pending, RunStatus::RiskAssessingBaseline),
            (RunStatus::RiskAssessingBaseline, RunStatus::Enhancing),
            (RunStatus::Enhancing, RunStatus::RiskAssessingProtected),
            (RunStatus::RiskAssessingProtected, RunStatus::EvaluatingUtility),
            (RunStatus::EvaluatingUtility, RunStatus::Completed),
        ]
    );

    // The protected table was stored under the run id
    let stored = storage.protected_dataset(run.id()).unwrap();
    assert_eq!(Some(&stored), run.protected_table());
}

#[test]
fn test_report_compares_baseline_and_protected_risk() {
    let (orchestrator, _, _) = orchestrator();
    let run = orchestrator.create_run(patients_request(5)).unwrap();
    orchestrator.run_to_completion(run.id()).unwrap();

    let report = orchestrator.report(run.id()).unwrap();
    assert_eq!(report.technique, "k_anonymity");
    assert_eq!(report.attempt, 1);
    assert_eq!(report.protected_checksum.len(), 64);

    let before = find_metric(&report.risk_metrics.baseline, K_ANONYMITY_VIOLATIONS).unwrap();
    let after = find_metric(&report.risk_metrics.protected, K_ANONYMITY_VIOLATIONS).unwrap();
    assert_eq!(before.value(), 1.0);
    assert_eq!(after.value(), 0.0);

    // Reports serialize for external surfaces
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["privacy_summary"]["technique"], "k_anonymity");
}

#[test]
fn test_report_unavailable_before_completion() {
    let (orchestrator, _, _) = orchestrator();
    let run = orchestrator.create_run(patients_request(5)).unwrap();
    orchestrator.advance(run.id()).unwrap();

    let err = orchestrator.report(run.id()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_advance_while_leased_is_busy() {
    let (orchestrator, repository, _) = orchestrator();
    let run = orchestrator.create_run(patients_request(5)).unwrap();

    assert!(repository.try_lock(run.id()).unwrap());
    let err = orchestrator.advance(run.id()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunBusy);

    // Nothing moved
    assert_eq!(
        orchestrator.get_run(run.id()).unwrap().status(),
        RunStatus::Pending
    );

    repository.unlock(run.id()).unwrap();
    assert_eq!(
        orchestrator.advance(run.id()).unwrap(),
        RunStatus::RiskAssessingBaseline
    );
}

#[test]
fn test_cancel_during_stage_applies_at_next_boundary() {
    let (orchestrator, repository, _) = orchestrator();
    let run = orchestrator.create_run(patients_request(5)).unwrap();
    orchestrator.advance(run.id()).unwrap();
    orchestrator.advance(run.id()).unwrap();

    // Another context holds the lease; the request is only flagged
    assert!(repository.try_lock(run.id()).unwrap());
    assert_eq!(
        orchestrator.request_cancel(run.id()).unwrap(),
        RunStatus::Enhancing
    );
    assert!(repository.is_cancel_requested(run.id()).unwrap());
    repository.unlock(run.id()).unwrap();

    assert_eq!(orchestrator.advance(run.id()).unwrap(), RunStatus::Failed);
    let run = orchestrator.get_run(run.id()).unwrap();
    let failure = run.failure().unwrap();
    assert!(failure.is_cancelled());
    assert_eq!(failure.stage, RunStatus::Enhancing);
    assert!(run.protected_table().is_none());
}

#[test]
fn test_cancel_completed_run_is_a_no_op() {
    let (orchestrator, repository, _) = orchestrator();
    let run = orchestrator.create_run(patients_request(5)).unwrap();
    orchestrator.run_to_completion(run.id()).unwrap();

    assert_eq!(
        orchestrator.request_cancel(run.id()).unwrap(),
        RunStatus::Completed
    );
    assert!(!repository.is_cancel_requested(run.id()).unwrap());
    assert!(orchestrator.report(run.id()).is_ok());
}

#[test]
fn test_retry_after_unsatisfiable_k() {
    let (orchestrator, _, _) = orchestrator();
    let run = orchestrator.create_run(small_request(9)).unwrap();
    let failed = orchestrator.run_to_completion(run.id()).unwrap();

    assert_eq!(failed.status(), RunStatus::Failed);
    assert_eq!(
        failed.failure().unwrap().kind,
        ErrorKind::UnsatisfiableKAnonymity
    );

    let retried = orchestrator
        .retry_with_config(
            run.id(),
            PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2).unwrap()),
        )
        .unwrap();
    assert_eq!(retried.id(), run.id());
    assert_eq!(retried.attempt(), 2);
    assert_eq!(retried.status(), RunStatus::RiskAssessingBaseline);
    assert!(retried.failure().is_none());

    let completed = orchestrator.run_to_completion(run.id()).unwrap();
    assert_eq!(completed.status(), RunStatus::Completed);
    assert_eq!(orchestrator.report(run.id()).unwrap().attempt, 2);
}

#[test]
fn test_retry_rejected_for_other_failures() {
    let (orchestrator, _, _) = orchestrator();
    let run = orchestrator.create_run(patients_request(5)).unwrap();
    orchestrator.request_cancel(run.id()).unwrap();

    let err = orchestrator
        .retry_with_config(
            run.id(),
            PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2).unwrap()),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_create_run_rejects_missing_quasi_identifier() {
    let (orchestrator, _, _) = orchestrator();
    let mut request = small_request(2);
    request.qi_spec = common::patients_qi();

    let err = orchestrator.create_run(request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(orchestrator.list_runs().unwrap().is_empty());
}

#[test]
fn test_create_run_rejects_unknown_auxiliary() {
    let (orchestrator, _, _) = orchestrator();
    let request = patients_request(5).with_auxiliary(DatasetId::new("voters").unwrap());

    assert!(matches!(
        orchestrator.create_run(request),
        Err(SafeDataError::NotFound(_))
    ));
}

#[test]
fn test_linkage_risk_tracked_with_auxiliary() {
    let (orchestrator, _, _) = orchestrator();
    let request = patients_request(5).with_auxiliary(DatasetId::new("patients").unwrap());
    let run = orchestrator.create_run(request).unwrap();
    orchestrator.run_to_completion(run.id()).unwrap();

    let report = orchestrator.report(run.id()).unwrap();
    let before = find_metric(&report.risk_metrics.baseline, "linkage_risk_mean").unwrap();
    let after = find_metric(&report.risk_metrics.protected, "linkage_risk_mean").unwrap();
    assert_eq!(before.value(), 1.0);
    assert!(after.value() <= 0.2);
}

#[test]
fn test_file_repository_resumes_in_new_orchestrator() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(storage());

    let run_id = {
        let repository = Arc::new(FileRunRepository::new(dir.path()).unwrap());
        let orchestrator = PipelineOrchestrator::new(repository, storage.clone());
        let run = orchestrator.create_run(patients_request(5)).unwrap();
        orchestrator.advance(run.id()).unwrap();
        orchestrator.advance(run.id()).unwrap();
        run.id()
    };

    let repository = Arc::new(FileRunRepository::new(dir.path()).unwrap());
    let orchestrator = PipelineOrchestrator::new(repository, storage);

    let resumed = orchestrator.get_run(run_id).unwrap();
    assert_eq!(resumed.status(), RunStatus::Enhancing);
    assert!(resumed.baseline_risk().is_some());

    let completed = orchestrator.run_to_completion(run_id).unwrap();
    assert_eq!(completed.status(), RunStatus::Completed);
    assert_eq!(completed.history().len(), 5);
}

#[test]
fn test_filesystem_storage_and_audit_trail() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(
        data_dir.join("patients.json"),
        serde_json::to_vec(&common::patients()).unwrap(),
    )
    .unwrap();

    let storage = Arc::new(FileDatasetStorage::new(&data_dir, dir.path().join("output")));
    let repository = Arc::new(FileRunRepository::new(dir.path().join("runs")).unwrap());
    let audit_path = dir.path().join("logs").join("audit.log");
    let audit = AuditLogger::new(audit_path.clone(), true, true).unwrap();
    let orchestrator =
        PipelineOrchestrator::new(repository, storage).with_audit(Arc::new(audit));

    let run = orchestrator.create_run(patients_request(5)).unwrap();
    let run = orchestrator.run_to_completion(run.id()).unwrap();

    let handle = run.protected_dataset().unwrap();
    assert!(std::path::Path::new(handle).exists());

    let audit_log = std::fs::read_to_string(&audit_path).unwrap();
    let events: Vec<serde_json::Value> = audit_log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    // One creation entry plus one per transition
    assert_eq!(events.len(), 6);
    assert_eq!(events[0]["event"], "created");
    assert_eq!(events[5]["to"], "completed");
    assert!(!audit_log.contains("flu"));
}
