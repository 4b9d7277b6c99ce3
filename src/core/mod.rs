//! Core pipeline logic for SafeData.
//!
//! # Modules
//!
//! - [`pipeline`] - Run model, orchestrator state machine and reports
//! - [`executor`] - Background execution on a bounded tokio worker pool
//! - [`state`] - Run repositories and the per-run lease
//! - [`verification`] - Checksums of protected tables
//!
//! # Workflow
//!
//! 1. **Create**: validate the request against its datasets, persist a `Pending` run
//! 2. **Baseline risk**: assess the original table
//! 3. **Enhance**: apply k-anonymity or differential privacy
//! 4. **Protected risk**: assess the protected table
//! 5. **Utility**: compare original and protected tables, store the protected table
//! 6. **Report**: assemble the [`PipelineReport`](pipeline::PipelineReport)
//!
//! # Example
//!
//! ```rust
//! use safedata::adapters::storage::InMemoryDatasetStorage;
//! use safedata::core::pipeline::{PipelineOrchestrator, RunRequest, RunStatus};
//! use safedata::core::state::InMemoryRunRepository;
//! use safedata::domain::{Column, DatasetId, DatasetTable, QuasiIdentifierSpec};
//! use safedata::privacy::{KAnonymityParams, PrivacyEnhancementConfig};
//! use std::sync::Arc;
//!
//! # fn example() -> safedata::domain::Result<()> {
//! let storage = InMemoryDatasetStorage::new();
//! storage.insert(
//!     DatasetId::new("patients").map_err(safedata::domain::SafeDataError::Configuration)?,
//!     DatasetTable::new(vec![
//!         Column::numeric("age", [31, 33, 47, 45])?,
//!         Column::categorical("diagnosis", ["flu", "cold", "flu", "cold"])?,
//!     ])?,
//! );
//!
//! let orchestrator = PipelineOrchestrator::new(
//!     Arc::new(InMemoryRunRepository::new()),
//!     Arc::new(storage),
//! );
//! let request = RunRequest::new(
//!     DatasetId::new("patients").map_err(safedata::domain::SafeDataError::Configuration)?,
//!     QuasiIdentifierSpec::new(["age"], ["diagnosis"])?,
//!     PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2)?),
//! );
//!
//! let run = orchestrator.create_run(request)?;
//! let run = orchestrator.run_to_completion(run.id())?;
//! assert_eq!(run.status(), RunStatus::Completed);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod executor;
pub mod pipeline;
pub mod state;
pub mod verification;

pub use executor::{PipelineExecutor, RunOutcome};
