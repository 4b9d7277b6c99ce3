//! Status command implementation
//!
//! Lists persisted runs, or shows one run with its transition history.

use crate::cli::commands::common::{
    build_orchestrator, exit_code_for_error, parse_run_id, EXIT_CONFIG, EXIT_FATAL, EXIT_OK,
};
use crate::config::load_config;
use crate::core::pipeline::{PipelineRun, RunStatus};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show a single run in detail
    pub run_id: Option<String>,

    /// Filter the listing by dataset id
    #[arg(long)]
    pub dataset: Option<String>,

    /// Print the run document as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking run status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(EXIT_CONFIG);
            }
        };

        let orchestrator = match build_orchestrator(&config) {
            Ok(o) => o,
            Err(e) => {
                println!("❌ Failed to open run storage");
                println!("   Error: {}", e);
                return Ok(EXIT_FATAL);
            }
        };

        if let Some(raw_id) = &self.run_id {
            let run_id = match parse_run_id(raw_id) {
                Ok(id) => id,
                Err(e) => {
                    println!("❌ {e}");
                    return Ok(EXIT_CONFIG);
                }
            };
            return match orchestrator.get_run(run_id) {
                Ok(run) if self.json => {
                    println!("{}", serde_json::to_string_pretty(&run)?);
                    Ok(EXIT_OK)
                }
                Ok(run) => {
                    print_run_detail(&run);
                    Ok(EXIT_OK)
                }
                Err(e) => {
                    println!("❌ {e}");
                    Ok(exit_code_for_error(&e))
                }
            };
        }

        let runs = match orchestrator.list_runs() {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Failed to list runs");
                println!("   Error: {}", e);
                return Ok(EXIT_FATAL);
            }
        };

        let runs: Vec<_> = runs
            .iter()
            .filter(|r| {
                self.dataset
                    .as_deref()
                    .map_or(true, |d| r.request().dataset_id.as_str() == d)
            })
            .collect();

        println!("📊 Pipeline Runs");
        println!();

        if runs.is_empty() {
            println!("No runs found.");
            println!("Run 'safedata run <dataset>' to start one.");
            return Ok(EXIT_OK);
        }

        println!(
            "{:<38} {:<20} {:<22} {:<28} {:<8}",
            "Run ID", "Dataset", "Technique", "Status", "Attempt"
        );
        println!("{}", "-".repeat(120));

        for run in runs {
            println!(
                "{:<38} {:<20} {:<22} {:<28} {:<8}",
                run.id().to_string(),
                run.request().dataset_id.as_str(),
                run.request().config.technique(),
                status_label(run),
                run.attempt()
            );
        }

        println!();
        Ok(EXIT_OK)
    }
}

fn status_label(run: &PipelineRun) -> String {
    match run.status() {
        RunStatus::Completed => "✅ completed".to_string(),
        RunStatus::Failed if run.failure().is_some_and(|f| f.is_cancelled()) => {
            "🛑 cancelled".to_string()
        }
        RunStatus::Failed => "❌ failed".to_string(),
        RunStatus::Pending => "⏸️  pending".to_string(),
        status => format!("🔄 {status}"),
    }
}

fn print_run_detail(run: &PipelineRun) {
    println!("📋 Run {}", run.id());
    println!("  Dataset: {}", run.request().dataset_id);
    if let Some(aux) = &run.request().auxiliary_dataset_id {
        println!("  Auxiliary: {aux}");
    }
    println!("  Technique: {}", run.request().config.technique());
    println!("  Status: {}", status_label(run));
    println!("  Attempt: {}", run.attempt());
    println!(
        "  Created: {}",
        run.created_at().format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(completed) = run.completed_at() {
        println!("  Finished: {}", completed.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(failure) = run.failure() {
        println!("  Failure: [{}] at {}: {}", failure.kind, failure.stage, failure.message);
    }
    if let Some(checksum) = run.protected_checksum() {
        println!("  Checksum: {checksum}");
    }

    println!();
    println!("  History:");
    for transition in run.history() {
        println!(
            "    {}  {} -> {}",
            transition.at.format("%H:%M:%S%.3f"),
            transition.from,
            transition.to
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::RunRequest;
    use crate::domain::{DatasetId, QuasiIdentifierSpec};
    use crate::privacy::{KAnonymityParams, PrivacyEnhancementConfig};

    #[test]
    fn test_status_label_for_pending_run() {
        let run = PipelineRun::new(RunRequest::new(
            DatasetId::new("patients").unwrap(),
            QuasiIdentifierSpec::new(["age"], Vec::<String>::new()).unwrap(),
            PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2).unwrap()),
        ));
        assert_eq!(status_label(&run), "⏸️  pending");
    }
}
