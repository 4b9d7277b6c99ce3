//! Audit logger for pipeline runs

use crate::config::AuditConfig;
use crate::core::pipeline::{PipelineRun, RunStatus};
use crate::domain::errors::SafeDataError;
use crate::domain::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Lifecycle event recorded for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Created,
    Transition,
    CancelRequested,
    Retried,
}

impl AuditEvent {
    fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Created => "created",
            AuditEvent::Transition => "transition",
            AuditEvent::CancelRequested => "cancel_requested",
            AuditEvent::Retried => "retried",
        }
    }
}

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditLogEntry {
    timestamp: String,
    event: AuditEvent,
    run_id: String,
    dataset_id: String,
    technique: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<RunStatus>,
    to: RunStatus,
    attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<String>,
    /// SHA-256 of the protected table, once one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    protected_checksum: Option<String>,
}

/// Audit logger for run lifecycle events
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    enabled: bool,
    write_lock: Mutex<()>,
}

impl AuditLogger {
    /// Create a new audit logger
    ///
    /// # Errors
    ///
    /// Returns [`SafeDataError::Io`] if the log directory cannot be created
    pub fn new(log_path: PathBuf, json_format: bool, enabled: bool) -> Result<Self> {
        if enabled {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SafeDataError::Io(format!(
                        "Failed to create audit log directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        Ok(Self {
            log_path,
            json_format,
            enabled,
            write_lock: Mutex::new(()),
        })
    }

    /// Create a logger from the `[audit]` configuration section
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        Self::new(
            PathBuf::from(&config.log_path),
            config.json_format,
            config.enabled,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an event for a run in its current state
    ///
    /// `from` is the status before a transition, when there was one.
    pub fn record(&self, event: AuditEvent, run: &PipelineRun, from: Option<RunStatus>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = AuditLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            event,
            run_id: run.id().to_string(),
            dataset_id: run.request().dataset_id.to_string(),
            technique: run.request().config.technique(),
            from,
            to: run.status(),
            attempt: run.attempt(),
            error_kind: run.failure().map(|f| f.kind.to_string()),
            protected_checksum: run.protected_checksum().map(str::to_string),
        };

        self.write_entry(&entry)
    }

    /// Write an audit entry to the log file
    fn write_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                SafeDataError::Io(format!(
                    "Failed to open audit log {}: {e}",
                    self.log_path.display()
                ))
            })?;

        if self.json_format {
            let json_line = serde_json::to_string(entry)?;
            writeln!(file, "{json_line}")?;
        } else {
            let from = entry.from.map(|s| s.as_str()).unwrap_or("-");
            writeln!(
                file,
                "[{}] Run: {} | Event: {} | {} -> {} | Attempt: {} | Technique: {}",
                entry.timestamp,
                entry.run_id,
                entry.event.as_str(),
                from,
                entry.to,
                entry.attempt,
                entry.technique
            )?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("log_path", &self.log_path)
            .field("json_format", &self.json_format)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::RunRequest;
    use crate::domain::{DatasetId, QuasiIdentifierSpec};
    use crate::privacy::{KAnonymityParams, PrivacyEnhancementConfig};
    use tempfile::tempdir;

    fn run() -> PipelineRun {
        let request = RunRequest::new(
            DatasetId::new("patients").unwrap(),
            QuasiIdentifierSpec::new(["age"], ["diagnosis"]).unwrap(),
            PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2).unwrap()),
        );
        PipelineRun::new(request)
    }

    #[test]
    fn test_record_json_entry() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit").join("audit.log");
        let logger = AuditLogger::new(log_path.clone(), true, true).unwrap();

        let run = run();
        logger.record(AuditEvent::Created, &run, None).unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        let entry: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(entry["event"], "created");
        assert_eq!(entry["to"], "pending");
        assert_eq!(entry["technique"], "k_anonymity");
        assert_eq!(entry["run_id"], run.id().to_string());
        assert!(entry.get("from").is_none());
    }

    #[test]
    fn test_record_plain_text() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.log");
        let logger = AuditLogger::new(log_path.clone(), false, true).unwrap();

        logger
            .record(AuditEvent::Transition, &run(), Some(RunStatus::Pending))
            .unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("Event: transition"));
        assert!(content.contains("pending -> pending"));
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.log");
        let logger = AuditLogger::new(log_path.clone(), true, false).unwrap();

        logger.record(AuditEvent::Created, &run(), None).unwrap();
        assert!(!log_path.exists());
    }
}
