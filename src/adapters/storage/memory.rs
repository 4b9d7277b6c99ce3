//! In-memory dataset storage, used by tests and embedding callers

use crate::adapters::storage::traits::DatasetStorage;
use crate::domain::errors::SafeDataError;
use crate::domain::ids::{DatasetId, RunId};
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct InMemoryDatasetStorage {
    datasets: RwLock<HashMap<DatasetId, DatasetTable>>,
    protected: RwLock<HashMap<RunId, DatasetTable>>,
}

impl InMemoryDatasetStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset, replacing any previous one with the same id
    pub fn insert(&self, id: DatasetId, table: DatasetTable) {
        self.datasets.write().insert(id, table);
    }

    /// Protected table saved for a run
    pub fn protected_dataset(&self, run_id: RunId) -> Option<DatasetTable> {
        self.protected.read().get(&run_id).cloned()
    }
}

impl DatasetStorage for InMemoryDatasetStorage {
    fn load_dataset(&self, id: &DatasetId) -> Result<DatasetTable> {
        self.datasets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SafeDataError::NotFound(format!("Dataset '{id}'")))
    }

    fn save_protected_dataset(&self, run_id: RunId, table: &DatasetTable) -> Result<String> {
        self.protected.write().insert(run_id, table.clone());
        Ok(format!("memory://protected/{run_id}"))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
