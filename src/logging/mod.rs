//! Logging and observability
//!
//! Structured `tracing` output to the console and, optionally, JSON files
//! with rotation. Stage macros keep the field names consistent across the
//! orchestrator and executor.
//!
//! # Example
//!
//! ```no_run
//! use safedata::logging::init_logging;
//! use safedata::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use safedata::log_stage_start;
/// use safedata::domain::RunId;
///
/// let run_id = RunId::generate();
/// log_stage_start!(run_id, "enhancing", 1);
/// ```
#[macro_export]
macro_rules! log_stage_start {
    ($run_id:expr, $stage:expr, $attempt:expr) => {
        tracing::info!(
            run_id = %$run_id,
            stage = %$stage,
            attempt = $attempt,
            "Starting stage"
        );
    };
}

/// Log the completion of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use safedata::log_stage_complete;
/// use safedata::domain::RunId;
/// use std::time::Duration;
///
/// let run_id = RunId::generate();
/// log_stage_complete!(run_id, "enhancing", "risk_assessing_protected", Duration::from_millis(12));
/// ```
#[macro_export]
macro_rules! log_stage_complete {
    ($run_id:expr, $stage:expr, $next:expr, $duration:expr) => {
        tracing::info!(
            run_id = %$run_id,
            stage = %$stage,
            next = %$next,
            duration_ms = $duration.as_millis() as u64,
            "Stage completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use safedata::log_error_with_context;
/// use safedata::domain::SafeDataError;
///
/// let error = SafeDataError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
