//! File-backed run repository
//!
//! Layout under the runs directory:
//! - `<run_id>.json`: the run document, replaced atomically via rename
//! - `<run_id>.lock`: lease marker, created with `create_new`
//! - `<run_id>.cancel`: cancellation marker
//!
//! Because leases and cancellation are plain files, separate processes
//! sharing the directory coordinate through them. A lease left behind by a
//! crashed process is released with [`RunRepository::unlock`].

use crate::core::pipeline::run::PipelineRun;
use crate::core::state::repository::RunRepository;
use crate::domain::errors::SafeDataError;
use crate::domain::ids::RunId;
use crate::domain::Result;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

/// Runs persisted as JSON documents in one directory
#[derive(Debug, Clone)]
pub struct FileRunRepository {
    dir: PathBuf,
}

impl FileRunRepository {
    /// Open (and create if needed) a runs directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            SafeDataError::Storage(format!(
                "Failed to create runs directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn run_path(&self, run_id: RunId) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    fn lock_path(&self, run_id: RunId) -> PathBuf {
        self.dir.join(format!("{run_id}.lock"))
    }

    fn cancel_path(&self, run_id: RunId) -> PathBuf {
        self.dir.join(format!("{run_id}.cancel"))
    }

    fn write_run(&self, run: &PipelineRun) -> Result<()> {
        let path = self.run_path(run.id());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(run)?;
        fs::write(&tmp, json).map_err(|e| storage_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| storage_error(&path, e))?;
        Ok(())
    }

    fn read_run(path: &Path) -> Result<PipelineRun> {
        let bytes = fs::read(path).map_err(|e| storage_error(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            SafeDataError::Serialization(format!("Invalid run document {}: {e}", path.display()))
        })
    }

    fn remove_if_exists(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(path, e)),
        }
    }
}

fn storage_error(path: &Path, error: std::io::Error) -> SafeDataError {
    SafeDataError::Storage(format!("{}: {error}", path.display()))
}

impl RunRepository for FileRunRepository {
    fn insert(&self, run: &PipelineRun) -> Result<()> {
        if self.run_path(run.id()).exists() {
            return Err(SafeDataError::State(format!("Run {} already exists", run.id())));
        }
        self.write_run(run)
    }

    fn load(&self, run_id: RunId) -> Result<PipelineRun> {
        let path = self.run_path(run_id);
        if !path.exists() {
            return Err(SafeDataError::NotFound(format!("Run {run_id}")));
        }
        Self::read_run(&path)
    }

    fn save(&self, run: &PipelineRun) -> Result<()> {
        if !self.run_path(run.id()).exists() {
            return Err(SafeDataError::NotFound(format!("Run {}", run.id())));
        }
        self.write_run(run)
    }

    fn list(&self) -> Result<Vec<PipelineRun>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| storage_error(&self.dir, e))?;
        let mut runs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| storage_error(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                match Self::read_run(&path) {
                    Ok(run) => runs.push(run),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable run document")
                    }
                }
            }
        }
        runs.sort_by_key(|r| r.created_at());
        Ok(runs)
    }

    fn try_lock(&self, run_id: RunId) -> Result<bool> {
        let path = self.lock_path(run_id);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "pid={} acquired_at={}", std::process::id(), Utc::now().to_rfc3339())
                    .map_err(|e| storage_error(&path, e))?;
                Ok(true)
            }
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(storage_error(&path, e)),
        }
    }

    fn unlock(&self, run_id: RunId) -> Result<()> {
        Self::remove_if_exists(&self.lock_path(run_id))
    }

    fn request_cancel(&self, run_id: RunId) -> Result<()> {
        if !self.run_path(run_id).exists() {
            return Err(SafeDataError::NotFound(format!("Run {run_id}")));
        }
        let path = self.cancel_path(run_id);
        fs::write(&path, Utc::now().to_rfc3339()).map_err(|e| storage_error(&path, e))
    }

    fn is_cancel_requested(&self, run_id: RunId) -> Result<bool> {
        Ok(self.cancel_path(run_id).exists())
    }

    fn clear_cancel(&self, run_id: RunId) -> Result<()> {
        Self::remove_if_exists(&self.cancel_path(run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::run::RunRequest;
    use crate::domain::ids::DatasetId;
    use crate::domain::qi::QuasiIdentifierSpec;
    use crate::privacy::config::{KAnonymityParams, PrivacyEnhancementConfig};
    use tempfile::TempDir;

    fn run() -> PipelineRun {
        PipelineRun::new(RunRequest::new(
            DatasetId::new("patients").unwrap(),
            QuasiIdentifierSpec::new(["age"], Vec::<String>::new()).unwrap(),
            PrivacyEnhancementConfig::KAnonymity(KAnonymityParams::with_k(2).unwrap()),
        ))
    }

    #[test]
    fn test_insert_load_save() {
        let dir = TempDir::new().unwrap();
        let repo = FileRunRepository::new(dir.path()).unwrap();
        let mut run = run();
        repo.insert(&run).unwrap();
        assert!(repo.insert(&run).is_err());

        run.advance_status().unwrap();
        repo.save(&run).unwrap();
        assert_eq!(repo.load(run.id()).unwrap(), run);
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn test_lease_files() {
        let dir = TempDir::new().unwrap();
        let repo = FileRunRepository::new(dir.path()).unwrap();
        let id = run().id();
        assert!(repo.try_lock(id).unwrap());
        assert!(!repo.try_lock(id).unwrap());
        repo.unlock(id).unwrap();
        assert!(repo.try_lock(id).unwrap());
    }

    #[test]
    fn test_cancel_marker() {
        let dir = TempDir::new().unwrap();
        let repo = FileRunRepository::new(dir.path()).unwrap();
        let run = run();
        assert!(repo.request_cancel(run.id()).is_err());
        repo.insert(&run).unwrap();
        repo.request_cancel(run.id()).unwrap();
        assert!(repo.is_cancel_requested(run.id()).unwrap());
        repo.clear_cancel(run.id()).unwrap();
        assert!(!repo.is_cancel_requested(run.id()).unwrap());
    }

    #[test]
    fn test_load_unknown_run() {
        let dir = TempDir::new().unwrap();
        let repo = FileRunRepository::new(dir.path()).unwrap();
        assert!(matches!(
            repo.load(RunId::generate()),
            Err(SafeDataError::NotFound(_))
        ));
    }
}
