//! Validate config command implementation
//!
//! Loads and validates the configuration file, then prints a summary.

use crate::cli::commands::common::{EXIT_CONFIG, EXIT_OK};
use crate::config::load_config;
use crate::privacy::PrivacyEnhancementConfig;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Data Directory: {}", config.storage.data_dir);
        println!("  Runs Directory: {}", config.storage.runs_dir);
        println!("  Output Directory: {}", config.storage.output_dir);
        println!(
            "  Quasi-identifiers: {:?}",
            config.pipeline.quasi_identifiers
        );
        println!(
            "  Sensitive Attributes: {:?}",
            config.pipeline.sensitive_attributes
        );
        println!("  Technique: {}", config.pipeline.privacy.technique());

        match &config.pipeline.privacy {
            PrivacyEnhancementConfig::KAnonymity(params) => {
                println!("  k: {}", params.k());
                println!("  Numeric Bins: {}", params.bin_count());
                println!("  Hierarchies: {}", params.hierarchies().len());
            }
            PrivacyEnhancementConfig::DifferentialPrivacy(params) => {
                println!("  Epsilon: {}", params.epsilon());
                println!("  Sensitivity: {}", params.sensitivity());
                println!("  Mechanism: {:?}", params.mechanism());
                println!(
                    "  Seed: {}",
                    params
                        .seed()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "random".to_string())
                );
            }
        }

        println!("  Executor: {:?} ({} workers)", config.executor.mode, config.executor.workers);
        println!(
            "  Audit: {}",
            if config.audit.enabled {
                config.audit.log_path.as_str()
            } else {
                "disabled"
            }
        );
        println!();
        Ok(EXIT_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_validate_reports_config_errors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nquasi_identifiers = []").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
