//! Configuration management for SafeData.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! SafeData uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SAFEDATA_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Privacy parameters validated while they are deserialized
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`StorageConfig`] - Dataset, run and output directories
//! - [`PipelineConfig`] - Quasi-identifiers, risk threshold and privacy technique
//! - [`ExecutorConfig`] - Inline or background execution
//! - [`AuditConfig`] - Transition audit trail
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [storage]
//! data_dir = "${SAFEDATA_DATA_DIR}"
//!
//! [pipeline]
//! quasi_identifiers = ["age", "zip"]
//! sensitive_attributes = ["diagnosis"]
//!
//! [pipeline.privacy]
//! technique = "k_anonymity"
//! k = 5
//!
//! [[pipeline.privacy.hierarchies]]
//! kind = "prefix"
//! column = "zip"
//! lengths = [3, 1]
//! ```
//!
//! # Validation
//!
//! ```rust,no_run
//! use safedata::config::load_config;
//!
//! # fn example() {
//! match load_config("safedata.toml") {
//!     Ok(config) => println!("Technique: {}", config.pipeline.privacy.technique()),
//!     Err(e) => eprintln!("Configuration error: {}", e),
//! }
//! # }
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, AuditConfig, ExecutionMode, ExecutorConfig, LoggingConfig,
    PipelineConfig, SafeDataConfig, StorageConfig,
};
