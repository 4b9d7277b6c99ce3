//! Audit logging module
//!
//! Append-only record of run lifecycle events. Entries carry identifiers,
//! statuses and checksums only; table contents never reach the audit log.

pub mod logger;

pub use logger::{AuditEvent, AuditLogger};
