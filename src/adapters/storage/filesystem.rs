//! Filesystem dataset storage
//!
//! Datasets are JSON documents (`{"columns": [...]}`) named `<id>.json` in
//! the data directory. Protected tables are written to
//! `<output_dir>/<run_id>.json`.

use crate::adapters::storage::traits::DatasetStorage;
use crate::domain::errors::SafeDataError;
use crate::domain::ids::{DatasetId, RunId};
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FileDatasetStorage {
    data_dir: PathBuf,
    output_dir: PathBuf,
}

impl FileDatasetStorage {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Path a dataset id resolves to
    pub fn dataset_path(&self, id: &DatasetId) -> PathBuf {
        self.data_dir.join(format!("{}.json", id.as_str()))
    }
}

impl DatasetStorage for FileDatasetStorage {
    fn load_dataset(&self, id: &DatasetId) -> Result<DatasetTable> {
        let path = self.dataset_path(id);
        if !path.exists() {
            return Err(SafeDataError::NotFound(format!(
                "Dataset '{id}' ({})",
                path.display()
            )));
        }

        let bytes = fs::read(&path).map_err(|e| {
            SafeDataError::Storage(format!("Failed to read {}: {e}", path.display()))
        })?;
        let table: DatasetTable = serde_json::from_slice(&bytes).map_err(|e| {
            SafeDataError::Configuration(format!("Invalid dataset {}: {e}", path.display()))
        })?;

        tracing::debug!(
            dataset_id = %id,
            rows = table.row_count(),
            columns = table.column_count(),
            "Loaded dataset"
        );
        Ok(table)
    }

    fn save_protected_dataset(&self, run_id: RunId, table: &DatasetTable) -> Result<String> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            SafeDataError::Storage(format!(
                "Failed to create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let path = self.output_dir.join(format!("{run_id}.json"));
        let json = serde_json::to_vec_pretty(table)?;
        fs::write(&path, json).map_err(|e| {
            SafeDataError::Storage(format!("Failed to write {}: {e}", path.display()))
        })?;

        Ok(path.display().to_string())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
