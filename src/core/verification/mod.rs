//! Integrity checks for protected tables

pub mod checksum;

pub use checksum::table_checksum;
