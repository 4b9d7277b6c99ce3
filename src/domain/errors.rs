//! Domain error types
//!
//! This module defines the error hierarchy for SafeData. Engines return these
//! errors directly; the orchestrator turns them into a [`RunFailure`] that is
//! persisted on the run.
//!
//! [`RunFailure`]: crate::core::pipeline::RunFailure

use crate::domain::ids::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main SafeData error type
#[derive(Debug, Error)]
pub enum SafeDataError {
    /// Invalid or missing parameters, or a table that does not match the configured schema
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// k-anonymity cannot be reached with the requested k
    #[error("k-anonymity with k={requested} is unsatisfiable; achievable k is {achievable}")]
    UnsatisfiableKAnonymity { requested: usize, achievable: usize },

    /// Protected table structurally diverged from the original
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Another execution context holds the run lease
    #[error("Run {0} is busy")]
    RunBusy(RunId),

    /// The run was cancelled by a user request
    #[error("Run cancelled")]
    Cancelled,

    /// Unknown run or dataset
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal state transition or operation on a terminal run
    #[error("State error: {0}")]
    State(String),

    /// Storage collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// Serializable error classification persisted with failed runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    UnsatisfiableKAnonymity,
    SchemaMismatch,
    RunBusy,
    Cancelled,
    NotFound,
    State,
    Storage,
    Serialization,
    Io,
}

impl ErrorKind {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::UnsatisfiableKAnonymity => "unsatisfiable_k_anonymity",
            Self::SchemaMismatch => "schema_mismatch",
            Self::RunBusy => "run_busy",
            Self::Cancelled => "cancelled",
            Self::NotFound => "not_found",
            Self::State => "state",
            Self::Storage => "storage",
            Self::Serialization => "serialization",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SafeDataError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::UnsatisfiableKAnonymity { .. } => ErrorKind::UnsatisfiableKAnonymity,
            Self::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            Self::RunBusy(_) => ErrorKind::RunBusy,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::State(_) => ErrorKind::State,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether a caller may retry the same work later or with relaxed parameters
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UnsatisfiableKAnonymity { .. } | Self::RunBusy(_) | Self::Storage(_)
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for SafeDataError {
    fn from(err: std::io::Error) -> Self {
        SafeDataError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SafeDataError {
    fn from(err: serde_json::Error) -> Self {
        SafeDataError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SafeDataError {
    fn from(err: toml::de::Error) -> Self {
        SafeDataError::Configuration(format!("TOML parse error: {err}"))
    }
}
