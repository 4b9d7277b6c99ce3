//! Dataset storage port
//!
//! The pipeline never touches files or the network directly; it loads source
//! tables and hands back protected ones through this trait.

use crate::domain::ids::{DatasetId, RunId};
use crate::domain::table::DatasetTable;
use crate::domain::Result;

/// Source of input datasets and sink for protected ones
pub trait DatasetStorage: Send + Sync {
    /// Load a dataset by id
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::NotFound`] for an unknown id and
    /// [`SafeDataError::Storage`] for backend failures.
    ///
    /// [`SafeDataError::NotFound`]: crate::domain::SafeDataError::NotFound
    /// [`SafeDataError::Storage`]: crate::domain::SafeDataError::Storage
    fn load_dataset(&self, id: &DatasetId) -> Result<DatasetTable>;

    /// Persist the protected table of a run and return an opaque handle to it
    fn save_protected_dataset(&self, run_id: RunId, table: &DatasetTable) -> Result<String>;

    /// Storage backend name for logging
    fn backend_name(&self) -> &'static str;
}
