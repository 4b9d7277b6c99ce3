//! Run command implementation
//!
//! Creates a pipeline run for a dataset from the `[pipeline]` configuration
//! and executes it inline or on the background worker pool.

use crate::cli::commands::common::{
    build_orchestrator, execute_run, exit_code_for_error, print_outcome, EXIT_CONFIG, EXIT_FATAL,
};
use crate::config::{load_config, ExecutionMode};
use crate::core::pipeline::RunRequest;
use crate::domain::DatasetId;
use crate::privacy::PrivacyEnhancementConfig;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Dataset id to protect
    pub dataset: String,

    /// Auxiliary dataset id for linkage risk simulation
    #[arg(long)]
    pub auxiliary: Option<String>,

    /// Override k for k-anonymity
    #[arg(long)]
    pub k: Option<usize>,

    /// Override the risk violation threshold
    #[arg(long)]
    pub risk_threshold: Option<usize>,

    /// Execute on the background worker pool regardless of configuration
    #[arg(long)]
    pub background: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(dataset = %self.dataset, "Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        if self.background {
            config.executor.mode = ExecutionMode::Background;
        }

        let request = match self.build_request(&config.pipeline) {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Invalid run request");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let orchestrator = match build_orchestrator(&config) {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize storage");
                println!("❌ Failed to initialize storage");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        let run = match orchestrator.create_run(request) {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Failed to create run");
                println!("   Error: {e}");
                return Ok(exit_code_for_error(&e));
            }
        };

        println!("🚀 Run {} created for dataset '{}'", run.id(), self.dataset);
        println!("   Technique: {}", run.request().config.technique());

        match execute_run(&orchestrator, &config, run.id(), shutdown_signal).await {
            Ok(run) => Ok(print_outcome(&run)),
            Err(e) => {
                crate::log_error_with_context!(&e, "Run execution failed");
                println!("❌ Run execution failed: {e}");
                Ok(exit_code_for_error(&e))
            }
        }
    }

    fn build_request(
        &self,
        pipeline: &crate::config::PipelineConfig,
    ) -> crate::domain::Result<RunRequest> {
        let dataset_id = DatasetId::new(&self.dataset)
            .map_err(crate::domain::SafeDataError::Configuration)?;

        let privacy = match (&pipeline.privacy, self.k) {
            (PrivacyEnhancementConfig::KAnonymity(params), Some(k)) => {
                PrivacyEnhancementConfig::KAnonymity(params.with_requested_k(k)?)
            }
            (PrivacyEnhancementConfig::DifferentialPrivacy(_), Some(_)) => {
                return Err(crate::domain::SafeDataError::Configuration(
                    "--k only applies to k-anonymity".to_string(),
                ))
            }
            (config, None) => config.clone(),
        };

        let mut request = RunRequest::new(dataset_id, pipeline.qi_spec()?, privacy);
        if let Some(aux) = &self.auxiliary {
            request = request.with_auxiliary(
                DatasetId::new(aux).map_err(crate::domain::SafeDataError::Configuration)?,
            );
        }
        if let Some(threshold) = self.risk_threshold.or(pipeline.risk_threshold) {
            request = request.with_risk_threshold(threshold);
        }
        Ok(request)
    }
}
