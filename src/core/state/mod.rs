// Run persistence, leases and cancellation flags

pub mod file;
pub mod memory;
pub mod repository;

pub use file::FileRunRepository;
pub use memory::InMemoryRunRepository;
pub use repository::{RunLease, RunRepository};
