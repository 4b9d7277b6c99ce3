//! Domain models and types for SafeData.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Dataset tables** ([`DatasetTable`], [`Column`], [`Value`])
//! - **Quasi-identifier specification** ([`QuasiIdentifierSpec`])
//! - **Metrics** ([`RiskMetric`], [`UtilityMetric`])
//! - **Strongly-typed identifiers** ([`RunId`], [`DatasetId`])
//! - **Error types** ([`SafeDataError`], [`ErrorKind`]) and the [`Result`] alias
//!
//! # Example
//!
//! ```rust
//! use safedata::domain::{Column, DatasetTable, QuasiIdentifierSpec};
//!
//! # fn example() -> safedata::domain::Result<()> {
//! let table = DatasetTable::new(vec![
//!     Column::numeric("age", [34, 51, 34])?,
//!     Column::categorical("zip", ["02134", "02139", "02134"])?,
//!     Column::categorical("diagnosis", ["flu", "asthma", "flu"])?,
//! ])?;
//!
//! let qi = QuasiIdentifierSpec::new(["age", "zip"], ["diagnosis"])?;
//! qi.validate_against(&table)?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod metric;
pub mod qi;
pub mod result;
pub mod table;

// Re-export commonly used types for convenience
pub use errors::{ErrorKind, SafeDataError};
pub use ids::{DatasetId, RunId};
pub use metric::{find_metric, Metric, RiskMetric, UtilityMetric};
pub use qi::QuasiIdentifierSpec;
pub use result::Result;
pub use table::{Column, ColumnKind, DatasetTable, Value};
