//! External system integrations for SafeData.
//!
//! - [`storage`] - Dataset storage port with filesystem and in-memory backends
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern**: the pipeline depends on the
//! [`DatasetStorage`](storage::DatasetStorage) trait only, so engines never
//! perform I/O themselves and tests run entirely in memory.
//!
//! ```rust,no_run
//! use safedata::adapters::storage::{DatasetStorage, FileDatasetStorage};
//! use safedata::domain::DatasetId;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = FileDatasetStorage::new("data", "output");
//! let table = storage.load_dataset(&DatasetId::new("patients")?)?;
//! println!("{} rows", table.row_count());
//! # Ok(())
//! # }
//! ```

pub mod storage;
