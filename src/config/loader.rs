//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{ExecutionMode, SafeDataConfig};
use crate::domain::errors::SafeDataError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into SafeDataConfig
/// 4. Applies environment variable overrides (SAFEDATA_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`SafeDataError::Configuration`] if the file cannot be read,
/// a referenced environment variable is unset, the TOML is invalid (including
/// privacy parameters such as `k < 2` or a non-positive epsilon), or
/// validation fails.
///
/// # Examples
///
/// ```no_run
/// use safedata::config::loader::load_config;
///
/// let config = load_config("safedata.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<SafeDataConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SafeDataError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SafeDataError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text, applying substitution, overrides and validation
pub fn parse_config(contents: &str) -> Result<SafeDataConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: SafeDataConfig = toml::from_str(&contents)
        .map_err(|e| SafeDataError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        SafeDataError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| SafeDataError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        // Comment lines are copied verbatim
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(SafeDataError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the SAFEDATA_* prefix
///
/// Environment variables follow the pattern: SAFEDATA_<SECTION>_<KEY>
/// For example: SAFEDATA_STORAGE_DATA_DIR, SAFEDATA_EXECUTOR_WORKERS
fn apply_env_overrides(config: &mut SafeDataConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("SAFEDATA_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Storage overrides
    if let Ok(val) = std::env::var("SAFEDATA_STORAGE_DATA_DIR") {
        config.storage.data_dir = val;
    }
    if let Ok(val) = std::env::var("SAFEDATA_STORAGE_RUNS_DIR") {
        config.storage.runs_dir = val;
    }
    if let Ok(val) = std::env::var("SAFEDATA_STORAGE_OUTPUT_DIR") {
        config.storage.output_dir = val;
    }

    // Pipeline overrides
    if let Ok(val) = std::env::var("SAFEDATA_PIPELINE_RISK_THRESHOLD") {
        let threshold = val.parse().map_err(|_| {
            SafeDataError::Configuration(format!(
                "SAFEDATA_PIPELINE_RISK_THRESHOLD must be a positive integer, got '{val}'"
            ))
        })?;
        config.pipeline.risk_threshold = Some(threshold);
    }

    // Executor overrides
    if let Ok(val) = std::env::var("SAFEDATA_EXECUTOR_MODE") {
        config.executor.mode = match val.to_lowercase().as_str() {
            "inline" => ExecutionMode::Inline,
            "background" => ExecutionMode::Background,
            other => {
                return Err(SafeDataError::Configuration(format!(
                    "SAFEDATA_EXECUTOR_MODE must be 'inline' or 'background', got '{other}'"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("SAFEDATA_EXECUTOR_WORKERS") {
        if let Ok(workers) = val.parse() {
            config.executor.workers = workers;
        }
    }

    // Audit overrides
    if let Ok(val) = std::env::var("SAFEDATA_AUDIT_ENABLED") {
        config.audit.enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("SAFEDATA_AUDIT_LOG_PATH") {
        config.audit.log_path = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("SAFEDATA_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("SAFEDATA_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("SAFEDATA_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
