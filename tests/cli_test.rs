//! End-to-end tests for the CLI commands against a temporary workspace

mod common;

use safedata::cli::commands::cancel::CancelArgs;
use safedata::cli::commands::common::{
    build_orchestrator, EXIT_CONFIG, EXIT_INTERRUPTED, EXIT_OK, EXIT_RUN_FAILED,
};
use safedata::cli::commands::resume::ResumeArgs;
use safedata::cli::commands::run::RunArgs;
use safedata::cli::commands::status::StatusArgs;
use safedata::config::load_config;
use safedata::core::pipeline::RunStatus;
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::watch;

/// Workspace with a patients dataset and a k-anonymity configuration
fn workspace() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    std::fs::create_dir_all(root.join("data")).unwrap();
    std::fs::write(
        root.join("data").join("patients.json"),
        serde_json::to_vec(&common::patients()).unwrap(),
    )
    .unwrap();

    let config = format!(
        r#"
[storage]
data_dir = "{root}/data"
runs_dir = "{root}/runs"
output_dir = "{root}/output"

[pipeline]
quasi_identifiers = ["age", "zip"]
sensitive_attributes = ["diagnosis"]

[pipeline.privacy]
technique = "k_anonymity"
k = 5

[[pipeline.privacy.hierarchies]]
kind = "interval"
column = "age"
widths = [10]

[[pipeline.privacy.hierarchies]]
kind = "prefix"
column = "zip"
lengths = [3]

[audit]
log_path = "{root}/logs/audit.log"

[logging]
local_enabled = false
"#,
        root = root.display()
    );
    let config_path = root.join("safedata.toml");
    std::fs::write(&config_path, config).unwrap();

    (dir, config_path.display().to_string())
}

fn run_args(k: Option<usize>, background: bool) -> RunArgs {
    RunArgs {
        dataset: "patients".to_string(),
        auxiliary: None,
        k,
        risk_threshold: None,
        background,
    }
}

#[tokio::test]
async fn test_run_command_completes_inline() {
    let (dir, config_path) = workspace();
    let (_tx, rx) = watch::channel(false);

    let code = run_args(None, false).execute(&config_path, rx).await.unwrap();
    assert_eq!(code, EXIT_OK);

    let config = load_config(&config_path).unwrap();
    let runs = build_orchestrator(&config).unwrap().list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status(), RunStatus::Completed);

    let output = dir.path().join("output").join(format!("{}.json", runs[0].id()));
    assert!(output.exists());
    assert!(Path::new(&config.audit.log_path).exists());

    let status = StatusArgs {
        run_id: Some(runs[0].id().to_string()),
        dataset: None,
        json: true,
    };
    assert_eq!(status.execute(&config_path).await.unwrap(), EXIT_OK);
}

#[tokio::test]
async fn test_run_command_in_background() {
    let (_dir, config_path) = workspace();
    let (_tx, rx) = watch::channel(false);

    let code = run_args(None, true).execute(&config_path, rx).await.unwrap();
    assert_eq!(code, EXIT_OK);
}

#[tokio::test]
async fn test_unsatisfiable_run_then_resume_with_smaller_k() {
    let (_dir, config_path) = workspace();
    let (_tx, rx) = watch::channel(false);

    let code = run_args(Some(101), false)
        .execute(&config_path, rx.clone())
        .await
        .unwrap();
    assert_eq!(code, EXIT_RUN_FAILED);

    let config = load_config(&config_path).unwrap();
    let orchestrator = build_orchestrator(&config).unwrap();
    let run_id = orchestrator.list_runs().unwrap()[0].id();

    let resume = ResumeArgs {
        run_id: run_id.to_string(),
        k: Some(5),
        force: false,
    };
    assert_eq!(resume.execute(&config_path, rx).await.unwrap(), EXIT_OK);

    let run = orchestrator.get_run(run_id).unwrap();
    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(run.attempt(), 2);
}

#[tokio::test]
async fn test_run_command_unknown_dataset() {
    let (_dir, config_path) = workspace();
    let (_tx, rx) = watch::channel(false);

    let mut args = run_args(None, false);
    args.dataset = "voters".to_string();
    assert_eq!(args.execute(&config_path, rx).await.unwrap(), EXIT_CONFIG);
}

#[tokio::test]
async fn test_shutdown_before_start_leaves_run_pending() {
    let (_dir, config_path) = workspace();
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let code = run_args(None, false).execute(&config_path, rx).await.unwrap();
    assert_eq!(code, EXIT_INTERRUPTED);

    let config = load_config(&config_path).unwrap();
    let orchestrator = build_orchestrator(&config).unwrap();
    let runs = orchestrator.list_runs().unwrap();
    let run = &runs[0];
    assert_eq!(run.status(), RunStatus::Pending);

    // A pending run can still be cancelled
    let cancel = CancelArgs {
        run_id: run.id().to_string(),
    };
    assert_eq!(cancel.execute(&config_path).await.unwrap(), EXIT_OK);
    assert_eq!(
        orchestrator.get_run(run.id()).unwrap().status(),
        RunStatus::Failed
    );
}
