//! Dataset storage backends

pub mod factory;
pub mod filesystem;
pub mod memory;
pub mod traits;

pub use factory::{create_dataset_storage, create_run_repository};
pub use filesystem::FileDatasetStorage;
pub use memory::InMemoryDatasetStorage;
pub use traits::DatasetStorage;
