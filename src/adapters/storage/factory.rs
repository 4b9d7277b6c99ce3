//! Storage factory
//!
//! Builds the dataset storage and run repository described by the
//! `[storage]` configuration section.

use crate::adapters::storage::filesystem::FileDatasetStorage;
use crate::adapters::storage::traits::DatasetStorage;
use crate::config::StorageConfig;
use crate::core::state::{FileRunRepository, RunRepository};
use crate::domain::Result;
use std::sync::Arc;

/// Create the dataset storage for the configured directories
pub fn create_dataset_storage(config: &StorageConfig) -> Arc<dyn DatasetStorage> {
    tracing::debug!(
        data_dir = %config.data_dir,
        output_dir = %config.output_dir,
        "Creating filesystem dataset storage"
    );
    Arc::new(FileDatasetStorage::new(&config.data_dir, &config.output_dir))
}

/// Create the run repository for the configured runs directory
///
/// # Errors
///
/// Returns an error if the runs directory cannot be created
pub fn create_run_repository(config: &StorageConfig) -> Result<Arc<dyn RunRepository>> {
    tracing::debug!(runs_dir = %config.runs_dir, "Creating filesystem run repository");
    Ok(Arc::new(FileRunRepository::new(&config.runs_dir)?))
}
