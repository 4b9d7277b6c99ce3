//! Configuration schema types
//!
//! This module defines the configuration structure that maps to `safedata.toml`.

use crate::domain::qi::QuasiIdentifierSpec;
use crate::domain::Result;
use crate::privacy::PrivacyEnhancementConfig;
use serde::{Deserialize, Serialize};

/// Main SafeData configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeDataConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Dataset and run storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Default pipeline request for the `run` command
    pub pipeline: PipelineConfig,

    /// Run execution settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Transition audit trail
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SafeDataConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.application.validate()?;
        self.storage.validate()?;
        self.pipeline.validate()?;
        self.executor.validate()?;
        self.audit.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `<dataset_id>.json` input tables
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory holding persisted run documents and leases
    #[serde(default = "default_runs_dir")]
    pub runs_dir: String,

    /// Directory protected tables are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl StorageConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        for (key, value) in [
            ("data_dir", &self.data_dir),
            ("runs_dir", &self.runs_dir),
            ("output_dir", &self.output_dir),
        ] {
            if value.trim().is_empty() {
                return Err(format!("storage.{key} cannot be empty"));
            }
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            runs_dir: default_runs_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Pipeline defaults applied to every run started from the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Quasi-identifier columns
    pub quasi_identifiers: Vec<String>,

    /// Sensitive attribute columns
    #[serde(default)]
    pub sensitive_attributes: Vec<String>,

    /// Minimum acceptable equivalence class size for risk assessment.
    /// Falls back to k for k-anonymity runs, then 1.
    #[serde(default)]
    pub risk_threshold: Option<usize>,

    /// Privacy technique and its parameters
    pub privacy: PrivacyEnhancementConfig,
}

impl PipelineConfig {
    /// Build the quasi-identifier specification
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty or overlapping column list
    pub fn qi_spec(&self) -> Result<QuasiIdentifierSpec> {
        QuasiIdentifierSpec::new(
            self.quasi_identifiers.iter().cloned(),
            self.sensitive_attributes.iter().cloned(),
        )
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let qi = self.qi_spec().map_err(|e| format!("pipeline: {e}"))?;

        if self.risk_threshold == Some(0) {
            return Err("pipeline.risk_threshold must be >= 1".to_string());
        }

        if let PrivacyEnhancementConfig::KAnonymity(params) = &self.privacy {
            for spec in params.hierarchies() {
                if !qi.is_quasi_identifier(spec.column()) {
                    return Err(format!(
                        "pipeline.privacy hierarchy column '{}' is not a quasi-identifier",
                        spec.column()
                    ));
                }
            }
        }
        Ok(())
    }
}

/// How the CLI executes runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Advance the run on the calling thread
    #[default]
    Inline,
    /// Hand the run to the background worker pool
    Background,
}

/// Run executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Inline or background execution
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Maximum runs executing concurrently in background mode
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds to wait for in-flight runs on shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl ExecutorConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.workers == 0 || self.workers > 64 {
            return Err("executor.workers must be between 1 and 64".to_string());
        }
        Ok(())
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            workers: default_workers(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Record run transitions
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Audit log file path
    #[serde(default = "default_audit_path")]
    pub log_path: String,

    /// JSON lines instead of plain text
    #[serde(default = "default_true")]
    pub json_format: bool,
}

impl AuditConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.enabled && self.log_path.trim().is_empty() {
            return Err("audit.log_path cannot be empty when audit is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: default_audit_path(),
            json_format: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_runs_dir() -> String {
    "runs".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_workers() -> usize {
    2
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_audit_path() -> String {
    "logs/audit.log".to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
