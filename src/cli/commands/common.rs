//! Helpers shared by the run-oriented commands

use crate::adapters::storage::{create_dataset_storage, create_run_repository};
use crate::audit::AuditLogger;
use crate::config::{ExecutionMode, SafeDataConfig};
use crate::core::pipeline::{PipelineOrchestrator, PipelineReport, PipelineRun, RunStatus};
use crate::core::{PipelineExecutor, RunOutcome};
use crate::domain::errors::{ErrorKind, SafeDataError};
use crate::domain::ids::RunId;
use crate::domain::metric::{find_metric, Metric};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Exit code for success
pub const EXIT_OK: i32 = 0;
/// Exit code for configuration errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for a run that ended `Failed`
pub const EXIT_RUN_FAILED: i32 = 3;
/// Exit code when another process is advancing the run
pub const EXIT_BUSY: i32 = 4;
/// Exit code for anything else
pub const EXIT_FATAL: i32 = 5;
/// Exit code when interrupted by a signal (standard Unix convention)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Build an orchestrator over the configured storage and audit log
pub fn build_orchestrator(config: &SafeDataConfig) -> crate::domain::Result<PipelineOrchestrator> {
    let repository = create_run_repository(&config.storage)?;
    let storage = create_dataset_storage(&config.storage);
    let mut orchestrator = PipelineOrchestrator::new(repository, storage);

    if config.audit.enabled {
        let audit = AuditLogger::from_config(&config.audit)?;
        orchestrator = orchestrator.with_audit(Arc::new(audit));
    }
    Ok(orchestrator)
}

/// Parse a run id argument
pub fn parse_run_id(value: &str) -> Result<RunId, String> {
    value
        .parse::<RunId>()
        .map_err(|e| format!("Invalid run id '{value}': {e}"))
}

/// Map an error from the orchestrator to an exit code
pub fn exit_code_for_error(error: &SafeDataError) -> i32 {
    match error.kind() {
        ErrorKind::Configuration | ErrorKind::SchemaMismatch | ErrorKind::NotFound => EXIT_CONFIG,
        ErrorKind::RunBusy => EXIT_BUSY,
        _ => EXIT_FATAL,
    }
}

/// Drive a run until it is terminal or shutdown is requested
///
/// Inline mode advances the run on the blocking thread pool, one stage per
/// task. Background mode hands it to a [`PipelineExecutor`] and, once
/// shutdown is requested, waits at most `shutdown_timeout_secs` for the
/// current stage. A stage still running when that timeout expires keeps its
/// run lease until the process exits; the file repository's lock file then
/// stays behind and `safedata resume <run-id> --force` releases it.
///
/// Returns the run as persisted when execution stopped.
pub async fn execute_run(
    orchestrator: &PipelineOrchestrator,
    config: &SafeDataConfig,
    run_id: RunId,
    shutdown: watch::Receiver<bool>,
) -> crate::domain::Result<PipelineRun> {
    match config.executor.mode {
        ExecutionMode::Inline => {
            tracing::info!(run_id = %run_id, "Executing run inline");
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let worker = orchestrator.clone();
                let status = tokio::task::spawn_blocking(move || worker.advance(run_id))
                    .await
                    .map_err(|e| {
                        SafeDataError::State(format!("Stage task for run {run_id} failed: {e}"))
                    })??;
                println!("   ➡️  {status}");
                if status.is_terminal() {
                    break;
                }
            }
        }
        ExecutionMode::Background => {
            tracing::info!(
                run_id = %run_id,
                workers = config.executor.workers,
                "Executing run in background"
            );
            let executor =
                PipelineExecutor::new(orchestrator.clone(), config.executor.workers, shutdown.clone());
            executor.on_complete(run_id, |outcome| match outcome {
                RunOutcome::Finished(run) | RunOutcome::Interrupted(run) => {
                    tracing::info!(run_id = %run.id(), status = %run.status(), "Background run stopped");
                }
                RunOutcome::Error(e) => {
                    tracing::warn!(error = %e, "Background run stopped with an error");
                }
            })?;
            executor.submit(run_id)?;

            let mut shutdown = shutdown;
            let timeout = Duration::from_secs(config.executor.shutdown_timeout_secs);
            tokio::select! {
                result = executor.wait(run_id) => {
                    result?;
                }
                _ = async {
                    // Only bound the wait once shutdown has been requested
                    if shutdown.wait_for(|stop| *stop).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                    tokio::time::sleep(timeout).await;
                } => {
                    tracing::warn!(run_id = %run_id, timeout_secs = timeout.as_secs(), "Shutdown timeout elapsed");
                    println!("⚠️  Stage still running after {}s; the run may stay locked.", timeout.as_secs());
                    println!("   Release it with: safedata resume {run_id} --force");
                }
            }
        }
    }

    orchestrator.get_run(run_id)
}

/// Print the outcome of a run and return the matching exit code
pub fn print_outcome(run: &PipelineRun) -> i32 {
    match run.status() {
        RunStatus::Completed => match PipelineReport::from_run(run) {
            Ok(report) => {
                print_report(&report);
                println!("✅ Run completed successfully!");
                EXIT_OK
            }
            Err(e) => {
                println!("❌ Failed to build report: {e}");
                EXIT_FATAL
            }
        },
        RunStatus::Failed => {
            let Some(failure) = run.failure() else {
                println!("❌ Run failed");
                return EXIT_RUN_FAILED;
            };
            if failure.is_cancelled() {
                println!("🛑 Run cancelled during stage {}", failure.stage);
            } else {
                println!("❌ Run failed during stage {}", failure.stage);
                println!("   Kind: {}", failure.kind);
                println!("   Error: {}", failure.message);
                if failure.kind == ErrorKind::UnsatisfiableKAnonymity {
                    println!(
                        "   Retry with a smaller k: safedata resume {} --k <k>",
                        run.id()
                    );
                }
            }
            EXIT_RUN_FAILED
        }
        status => {
            println!();
            println!("⚠️  Run interrupted at {status}. Progress saved.");
            println!("   Run 'safedata resume {}' to continue.", run.id());
            EXIT_INTERRUPTED
        }
    }
}

fn print_report(report: &PipelineReport) {
    println!();
    println!("📊 Run Report: {}", report.run_id);
    println!("  Dataset: {}", report.dataset_id);
    println!("  Technique: {}", report.technique);
    println!("  Attempt: {}", report.attempt);
    println!();
    println!("  Risk (baseline -> protected):");
    for baseline in &report.risk_metrics.baseline {
        let protected = find_metric(&report.risk_metrics.protected, baseline.name())
            .map(|m| format!("{:.4}", m.value()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "    {:<28} {:.4} -> {protected}",
            baseline.name(),
            baseline.value()
        );
    }
    println!();
    println!("  Utility:");
    for metric in &report.utility_metrics {
        print_metric(metric);
    }
    println!();
    println!("  Protected dataset: {}", report.protected_dataset);
    println!("  Checksum: {}", report.protected_checksum);
    println!();
}

fn print_metric(metric: &Metric) {
    println!("    {:<28} {:.4}", metric.name(), metric.value());
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(SafeDataError::Configuration("bad".into()) => EXIT_CONFIG; "configuration")]
    #[test_case(SafeDataError::NotFound("run".into()) => EXIT_CONFIG; "not found")]
    #[test_case(SafeDataError::RunBusy(RunId::generate()) => EXIT_BUSY; "busy")]
    #[test_case(SafeDataError::Storage("disk".into()) => EXIT_FATAL; "storage")]
    fn test_exit_code_for_error(error: SafeDataError) -> i32 {
        exit_code_for_error(&error)
    }

    fn inline_setup() -> (PipelineOrchestrator, SafeDataConfig) {
        use crate::adapters::storage::InMemoryDatasetStorage;
        use crate::core::state::InMemoryRunRepository;
        use crate::domain::{Column, DatasetId, DatasetTable};

        let storage = InMemoryDatasetStorage::new();
        storage.insert(
            DatasetId::new("regions").unwrap(),
            DatasetTable::new(vec![
                Column::categorical("region", ["n", "n", "s", "s"]).unwrap(),
                Column::numeric("score", [1, 2, 3, 4]).unwrap(),
            ])
            .unwrap(),
        );
        let orchestrator =
            PipelineOrchestrator::new(Arc::new(InMemoryRunRepository::new()), Arc::new(storage));
        let mut config = crate::config::parse_config(
            r#"
[pipeline]
quasi_identifiers = ["region"]
sensitive_attributes = ["score"]

[pipeline.privacy]
technique = "k_anonymity"
k = 2
"#,
        )
        .unwrap();
        config.executor.mode = ExecutionMode::Inline;
        (orchestrator, config)
    }

    #[tokio::test]
    async fn test_execute_run_inline_completes() {
        let (orchestrator, config) = inline_setup();
        let run = orchestrator
            .create_run(crate::core::pipeline::RunRequest::new(
                crate::domain::DatasetId::new("regions").unwrap(),
                config.pipeline.qi_spec().unwrap(),
                config.pipeline.privacy.clone(),
            ))
            .unwrap();

        let (_tx, rx) = watch::channel(false);
        let finished = execute_run(&orchestrator, &config, run.id(), rx).await.unwrap();
        assert_eq!(finished.status(), RunStatus::Completed);
        assert_eq!(print_outcome(&finished), EXIT_OK);
    }

    #[tokio::test]
    async fn test_execute_run_inline_stops_on_shutdown() {
        let (orchestrator, config) = inline_setup();
        let run = orchestrator
            .create_run(crate::core::pipeline::RunRequest::new(
                crate::domain::DatasetId::new("regions").unwrap(),
                config.pipeline.qi_spec().unwrap(),
                config.pipeline.privacy.clone(),
            ))
            .unwrap();

        let (_tx, rx) = watch::channel(true);
        let stopped = execute_run(&orchestrator, &config, run.id(), rx).await.unwrap();
        assert_eq!(stopped.status(), RunStatus::Pending);
        assert_eq!(print_outcome(&stopped), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_parse_run_id() {
        let id = RunId::generate();
        assert_eq!(parse_run_id(&id.to_string()).unwrap(), id);
        assert!(parse_run_id("not-a-run").is_err());
    }
}
