//! Resume command implementation
//!
//! Continues a persisted run from its last completed stage, or retries a run
//! that failed with an unsatisfiable k using a smaller one.

use crate::cli::commands::common::{
    build_orchestrator, execute_run, exit_code_for_error, parse_run_id, print_outcome,
    EXIT_CONFIG, EXIT_FATAL,
};
use crate::config::load_config;
use crate::privacy::PrivacyEnhancementConfig;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the resume command
#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Run id to resume
    pub run_id: String,

    /// Retry an unsatisfiable k-anonymity run with this k
    #[arg(long)]
    pub k: Option<usize>,

    /// Release a lease left behind by a crashed process
    #[arg(long)]
    pub force: bool,
}

impl ResumeArgs {
    /// Execute the resume command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let run_id = match parse_run_id(&self.run_id) {
            Ok(id) => id,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        tracing::info!(run_id = %run_id, force = self.force, "Resuming run");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let orchestrator = match build_orchestrator(&config) {
            Ok(o) => o,
            Err(e) => {
                println!("❌ Failed to initialize storage");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        if self.force {
            tracing::warn!(run_id = %run_id, "Force-releasing run lease");
            if let Err(e) = orchestrator.repository().unlock(run_id) {
                println!("❌ Failed to release lease: {e}");
                return Ok(exit_code_for_error(&e));
            }
        }

        let run = match orchestrator.get_run(run_id) {
            Ok(r) => r,
            Err(e) => {
                println!("❌ {e}");
                return Ok(exit_code_for_error(&e));
            }
        };

        if let Some(k) = self.k {
            let PrivacyEnhancementConfig::KAnonymity(params) = &run.request().config else {
                println!("❌ --k only applies to k-anonymity runs");
                return Ok(EXIT_CONFIG);
            };
            let config = match params.with_requested_k(k) {
                Ok(p) => PrivacyEnhancementConfig::KAnonymity(p),
                Err(e) => {
                    println!("❌ {e}");
                    return Ok(EXIT_CONFIG);
                }
            };
            match orchestrator.retry_with_config(run_id, config) {
                Ok(run) => println!("🔁 Retrying run {} (attempt {}) with k={k}", run.id(), run.attempt()),
                Err(e) => {
                    println!("❌ Cannot retry run: {e}");
                    return Ok(exit_code_for_error(&e));
                }
            }
        } else if run.is_terminal() {
            println!("ℹ️  Run {run_id} is already {}", run.status());
            return Ok(print_outcome(&run));
        } else {
            println!("▶️  Resuming run {run_id} at {}", run.status());
        }

        match execute_run(&orchestrator, &config, run_id, shutdown_signal).await {
            Ok(run) => Ok(print_outcome(&run)),
            Err(e) => {
                crate::log_error_with_context!(&e, "Run execution failed");
                println!("❌ Run execution failed: {e}");
                Ok(exit_code_for_error(&e))
            }
        }
    }
}
