// SafeData - Privacy-Utility Pipeline Engine
// Copyright (c) 2025 SafeData Contributors
// Licensed under the MIT License

//! # SafeData - Privacy-Utility Pipeline Engine
//!
//! SafeData takes a tabular dataset of individual records, measures how easily
//! individuals could be re-identified, applies a privacy-enhancing technique,
//! re-measures the risk, and quantifies how much analytical utility survived.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Assessing** re-identification risk from equivalence classes over
//!   quasi-identifiers, with optional linkage against an auxiliary dataset
//! - **Protecting** data with k-anonymity (hierarchy-based generalization and
//!   suppression) or differential privacy (Laplace noise)
//! - **Evaluating** utility loss between the original and protected tables
//! - **Orchestrating** the stages as a persisted, resumable state machine
//!
//! ## Architecture
//!
//! SafeData follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline orchestration, run state and background execution
//! - [`risk`], [`privacy`], [`utility`] - The three analysis engines
//! - [`adapters`] - Dataset storage backends
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`audit`] - Append-only audit trail of run transitions
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use safedata::cli::commands::common::build_orchestrator;
//! use safedata::config::load_config;
//! use safedata::core::pipeline::RunRequest;
//! use safedata::domain::DatasetId;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("safedata.toml")?;
//! let orchestrator = build_orchestrator(&config)?;
//!
//! let request = RunRequest::new(
//!     DatasetId::new("patients")?,
//!     config.pipeline.qi_spec()?,
//!     config.pipeline.privacy.clone(),
//! );
//! let run = orchestrator.create_run(request)?;
//! let run = orchestrator.run_to_completion(run.id())?;
//!
//! let report = orchestrator.report(run.id())?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the engines directly
//!
//! ```rust
//! use safedata::domain::{find_metric, Column, DatasetTable, QuasiIdentifierSpec};
//! use safedata::privacy::{KAnonymityParams, PrivacyEnhancementConfig, PrivacyEnhancementEngine};
//! use safedata::risk::RiskAssessmentEngine;
//!
//! # fn main() -> safedata::domain::Result<()> {
//! let table = DatasetTable::new(vec![
//!     Column::numeric("age", [31, 33, 47, 45])?,
//!     Column::categorical("diagnosis", ["flu", "cold", "flu", "cold"])?,
//! ])?;
//! let qi = QuasiIdentifierSpec::new(["age"], ["diagnosis"])?;
//!
//! let baseline = RiskAssessmentEngine::with_threshold(2).assess(&table, &qi, None)?;
//! assert_eq!(find_metric(&baseline, "k_anonymity_violations").map(|m| m.value()), Some(1.0));
//!
//! let config = PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2)?);
//! let protected = PrivacyEnhancementEngine::new().enhance(&table, &qi, &config)?;
//!
//! let after = RiskAssessmentEngine::with_threshold(2).assess(&protected.table, &qi, None)?;
//! assert_eq!(find_metric(&after, "k_anonymity_violations").map(|m| m.value()), Some(0.0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All library operations return [`domain::Result`], whose error type
//! [`domain::SafeDataError`] carries a stable [`domain::ErrorKind`]. The CLI
//! maps kinds to process exit codes.
//!
//! ## Logging
//!
//! SafeData uses structured logging with the `tracing` crate. Row values never
//! appear in log fields; only identifiers, counts and timings do.

pub mod adapters;
pub mod audit;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
pub mod privacy;
pub mod risk;
pub mod utility;
