//! Cancel command implementation

use crate::cli::commands::common::{
    build_orchestrator, exit_code_for_error, parse_run_id, EXIT_CONFIG, EXIT_FATAL, EXIT_OK,
};
use crate::config::load_config;
use crate::core::pipeline::RunStatus;
use clap::Args;

/// Arguments for the cancel command
#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Run id to cancel
    pub run_id: String,
}

impl CancelArgs {
    /// Execute the cancel command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let run_id = match parse_run_id(&self.run_id) {
            Ok(id) => id,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_CONFIG);
            }
        };

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

        match orchestrator.request_cancel(run_id) {
            Ok(RunStatus::Failed) => {
                println!("🛑 Run {run_id} is cancelled");
                Ok(EXIT_OK)
            }
            Ok(RunStatus::Completed) => {
                println!("ℹ️  Run {run_id} already completed; nothing to cancel");
                Ok(EXIT_OK)
            }
            Ok(status) => {
                println!("⏳ Cancellation requested; run {run_id} stops after its current stage ({status})");
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to cancel run: {e}");
                Ok(exit_code_for_error(&e))
            }
        }
    }
}
