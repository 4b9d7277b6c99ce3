//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use crate::cli::commands::common::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "safedata.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing SafeData configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your quasi-identifiers", self.output);
                println!("  2. Put datasets in the data directory as <id>.json");
                println!("  3. Validate configuration: safedata validate-config");
                println!("  4. Start a run: safedata run <dataset-id>");
                println!();
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(EXIT_FATAL)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# SafeData Configuration File

[application]
log_level = "info"

[storage]
data_dir = "data"
runs_dir = "runs"
output_dir = "output"

[pipeline]
quasi_identifiers = ["age", "zip"]
sensitive_attributes = ["diagnosis"]

[pipeline.privacy]
technique = "k_anonymity"
k = 5

[executor]
mode = "inline"

[audit]
enabled = true
log_path = "logs/audit.log"

[logging]
local_enabled = true
local_path = "logs"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# SafeData Configuration File
# Privacy-utility pipeline for tabular microdata
#
# Values may reference environment variables with ${VAR_NAME}.
# Any key can also be overridden with SAFEDATA_<SECTION>_<KEY>,
# e.g. SAFEDATA_STORAGE_DATA_DIR or SAFEDATA_EXECUTOR_WORKERS.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# Storage
# ============================================================================
[storage]
# Input datasets: <data_dir>/<dataset-id>.json, e.g.
# {"columns": [{"name": "age", "kind": "numeric", "values": [34, null, 51]}]}
data_dir = "data"

# Persisted runs, leases and cancellation markers
runs_dir = "runs"

# Protected datasets: <output_dir>/<run-id>.json
output_dir = "output"

# ============================================================================
# Pipeline
# ============================================================================
[pipeline]
# Columns an attacker could link on
quasi_identifiers = ["age", "zip"]

# Columns that must not be linkable to an individual
sensitive_attributes = ["diagnosis"]

# Equivalence classes smaller than this count as violations.
# Defaults to k for k-anonymity, otherwise 1.
# risk_threshold = 5

# ----------------------------------------------------------------------------
# k-anonymity
# ----------------------------------------------------------------------------
[pipeline.privacy]
technique = "k_anonymity"
k = 5

# Label for suppressed values
suppression_value = "*"

# Bin numeric quasi-identifiers without an explicit hierarchy
generalise_numeric = true
bin_count = 10

# Explicit hierarchies, finest level first
[[pipeline.privacy.hierarchies]]
kind = "prefix"
column = "zip"
lengths = [3, 1]
suppress = true

[[pipeline.privacy.hierarchies]]
kind = "interval"
column = "age"
widths = [5, 10, 20]

# ----------------------------------------------------------------------------
# Differential privacy (replace the section above)
# ----------------------------------------------------------------------------
# [pipeline.privacy]
# technique = "differential_privacy"
# epsilon = 1.0
# sensitivity = 1.0
# mechanism = "record"          # record | aggregate
# seed = 42                     # omit for a random seed (recorded on the run)
# randomized_response = false   # also perturb categorical columns
# excluded_columns = ["id"]

# ============================================================================
# Execution
# ============================================================================
[executor]
# inline: advance the run in this process
# background: hand it to the worker pool
mode = "inline"
workers = 2
shutdown_timeout_secs = 30

# ============================================================================
# Audit trail (identifiers and checksums only, never data)
# ============================================================================
[audit]
enabled = true
log_path = "logs/audit.log"
json_format = true

# ============================================================================
# Logging
# ============================================================================
[logging]
local_enabled = true
local_path = "logs"
local_rotation = "daily"        # daily | hourly | never
"#
        .to_string()
    }
}
