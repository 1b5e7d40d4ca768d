//! Job Lifecycle Module
//!
//! Allocates per-request job ids and owns each job's temp artifacts.
//! A [`JobScope`] deletes everything it tracks when dropped, on success and
//! failure alike, so no pipeline path needs its own cleanup calls.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::core::{CoreError, CoreResult, JobId};

/// Prefix of every job id
pub const JOB_ID_PREFIX: &str = "reel_";

/// Creates a new time-ordered job id
pub fn new_job_id() -> JobId {
    format!(
        "{}{}",
        JOB_ID_PREFIX,
        ulid::Ulid::new().to_string().to_lowercase()
    )
}

// =============================================================================
// Job Manager
// =============================================================================

/// Hands out job scopes under shared temp and output roots
#[derive(Clone, Debug)]
pub struct JobManager {
    temp_root: PathBuf,
    output_root: PathBuf,
}

impl JobManager {
    pub fn new(temp_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Creates the temp and output roots. Safe to call repeatedly and
    /// concurrently.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.temp_root)?;
        std::fs::create_dir_all(&self.output_root)?;
        Ok(())
    }

    /// Allocates a new job with its own temp directory
    pub fn allocate(&self) -> CoreResult<JobScope> {
        self.ensure_dirs()?;

        let id = new_job_id();
        let dir = self.temp_root.join(&id);
        std::fs::create_dir(&dir)?;

        let output_path = self.output_root.join(format!("{}.mp4", id));

        tracing::debug!(job_id = %id, dir = %dir.display(), "allocated job");

        Ok(JobScope {
            id,
            dir,
            output_path,
            artifacts: Vec::new(),
            created_at: Utc::now(),
            committed: false,
            released: false,
        })
    }
}

// =============================================================================
// Job Scope
// =============================================================================

/// Ownership of one job's temp namespace.
///
/// Intermediate files live under `{temp_root}/{job_id}/`. The output file
/// lives in the output root and survives only if [`JobScope::commit`] was
/// called.
#[derive(Debug)]
pub struct JobScope {
    id: JobId,
    dir: PathBuf,
    output_path: PathBuf,
    artifacts: Vec<PathBuf>,
    created_at: DateTime<Utc>,
    committed: bool,
    released: bool,
}

impl JobScope {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Path of a job-owned artifact named `{job_id}{suffix}`, tracked for
    /// deletion
    pub fn artifact(&mut self, suffix: &str) -> PathBuf {
        let path = self.dir.join(format!("{}{}", self.id, suffix));
        self.track(path.clone());
        path
    }

    /// Tracks an extra file for deletion
    pub fn track(&mut self, path: PathBuf) {
        if !self.artifacts.contains(&path) {
            self.artifacts.push(path);
        }
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Marks the output as handed off; it will not be deleted.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Deletes all intermediates now. Failures are logged and swallowed.
    ///
    /// Returns the number of paths that could not be removed.
    pub fn release(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        let mut failures = 0;

        for path in &self.artifacts {
            if let Err(err) = remove_file_if_exists(path) {
                log_cleanup_failure(&self.id, path, err);
                failures += 1;
            }
        }

        if !self.committed {
            if let Err(err) = remove_file_if_exists(&self.output_path) {
                log_cleanup_failure(&self.id, &self.output_path, err);
                failures += 1;
            }
        }

        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                log_cleanup_failure(&self.id, &self.dir, err);
                failures += 1;
            }
        }

        tracing::debug!(
            job_id = %self.id,
            committed = self.committed,
            failures,
            "released job artifacts"
        );

        failures
    }
}

impl Drop for JobScope {
    fn drop(&mut self) {
        self.release();
    }
}

fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn log_cleanup_failure(job_id: &str, path: &Path, err: std::io::Error) {
    let err = CoreError::Cleanup(format!("{}: {}", path.display(), err));
    tracing::warn!(job_id = %job_id, error = %err, "cleanup failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn manager() -> (tempfile::TempDir, JobManager) {
        let root = tempfile::tempdir().unwrap();
        let manager = JobManager::new(root.path().join("tmp"), root.path().join("output"));
        (root, manager)
    }

    #[test]
    fn test_job_id_format() {
        let id = new_job_id();
        assert!(id.starts_with("reel_"));
        assert_eq!(id.len(), JOB_ID_PREFIX.len() + 26);
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn test_job_ids_unique() {
        let ids: HashSet<_> = (0..1_000).map(|_| new_job_id()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let (_root, manager) = manager();
        manager.ensure_dirs().unwrap();
        manager.ensure_dirs().unwrap();
        assert!(manager.temp_root().is_dir());
        assert!(manager.output_root().is_dir());
    }

    #[test]
    fn test_allocate_namespaces_artifacts() {
        let (_root, manager) = manager();
        let mut job = manager.allocate().unwrap();

        let audio = job.artifact(".mp3");
        assert!(audio.starts_with(job.dir()));
        assert_eq!(
            audio.file_name().unwrap().to_string_lossy(),
            format!("{}.mp3", job.id())
        );
        assert!(job.output_path().starts_with(manager.output_root()));
        assert_eq!(job.artifacts().len(), 1);

        job.artifact(".mp3");
        assert_eq!(job.artifacts().len(), 1);
    }

    #[test]
    fn test_drop_removes_artifacts_and_uncommitted_output() {
        let (_root, manager) = manager();
        let (dir, output, audio) = {
            let mut job = manager.allocate().unwrap();
            let audio = job.artifact(".mp3");
            std::fs::write(&audio, b"audio").unwrap();
            std::fs::write(job.output_path(), b"partial").unwrap();
            (
                job.dir().to_path_buf(),
                job.output_path().to_path_buf(),
                audio,
            )
        };

        assert!(!audio.exists());
        assert!(!dir.exists());
        assert!(!output.exists());
    }

    #[test]
    fn test_committed_output_survives() {
        let (_root, manager) = manager();
        let mut job = manager.allocate().unwrap();
        let ass = job.artifact(".ass");
        std::fs::write(&ass, b"[Script Info]").unwrap();
        std::fs::write(job.output_path(), b"video").unwrap();

        job.commit();
        let output = job.output_path().to_path_buf();
        assert_eq!(job.release(), 0);
        drop(job);

        assert!(output.exists());
        assert!(!ass.exists());
    }

    #[test]
    fn test_release_tolerates_missing_files() {
        let (_root, manager) = manager();
        let mut job = manager.allocate().unwrap();
        job.artifact(".mp3");
        job.artifact("_padded.mp3");
        assert_eq!(job.release(), 0);
        assert_eq!(job.release(), 0);
    }

    #[test]
    fn test_external_tracked_file_is_removed() {
        let (root, manager) = manager();
        let mut job = manager.allocate().unwrap();
        let sidecar = root.path().join("voice.mp3.json");
        std::fs::write(&sidecar, b"[]").unwrap();
        job.track(sidecar.clone());
        drop(job);
        assert!(!sidecar.exists());
    }

    #[test]
    fn test_concurrent_jobs_do_not_share_dirs() {
        let (_root, manager) = manager();
        let a = manager.allocate().unwrap();
        let b = manager.allocate().unwrap();
        assert_ne!(a.dir(), b.dir());
        assert_ne!(a.output_path(), b.output_path());
    }
}
