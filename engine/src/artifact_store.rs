//! Artifact Store: on-disk persistence of agent outputs under
//! `<home>/storage/<owner>-<repo>/issue-<n>/<kind>-output.json`.
//!
//! Writes are atomic: the payload lands in a sibling temp file first and
//! is renamed into place, so a reader never observes a partial write.
//! Directories are created `0700`, files `0600`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::ArtifactKind;

#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub struct ArtifactStore {
    home_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self { home_dir: home_dir.into() }
    }

    fn issue_dir(&self, owner: &str, repo: &str, issue_number: u64) -> PathBuf {
        self.home_dir.join("storage").join(format!("{owner}-{repo}")).join(format!("issue-{issue_number}"))
    }

    fn artifact_path(&self, owner: &str, repo: &str, issue_number: u64, kind: ArtifactKind) -> PathBuf {
        self.issue_dir(owner, repo, issue_number).join(format!("{}.json", kind.file_stem()))
    }

    pub fn write<T: Serialize>(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        kind: ArtifactKind,
        value: &T,
    ) -> Result<PathBuf, ArtifactStoreError> {
        let dir = self.issue_dir(owner, repo, issue_number);
        std::fs::create_dir_all(&dir).map_err(|e| ArtifactStoreError::Io { path: dir.clone(), source: e })?;
        set_permissions(&dir, 0o700)?;

        let target = self.artifact_path(owner, repo, issue_number, kind);
        let tmp = target.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(value)?;

        std::fs::write(&tmp, &body).map_err(|e| ArtifactStoreError::Io { path: tmp.clone(), source: e })?;
        set_permissions(&tmp, 0o600)?;
        std::fs::rename(&tmp, &target).map_err(|e| ArtifactStoreError::Io { path: target.clone(), source: e })?;

        debug!(?target, "ArtifactStore::write: artifact persisted");
        Ok(target)
    }

    pub fn read<T: serde::de::DeserializeOwned>(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        kind: ArtifactKind,
    ) -> Result<Option<T>, ArtifactStoreError> {
        let path = self.artifact_path(owner, repo, issue_number, kind);
        if !path.exists() {
            return Ok(None);
        }
        let body = match std::fs::read(&path) {
            Ok(body) => body,
            Err(e) => return Err(ArtifactStoreError::Io { path, source: e }),
        };
        match serde_json::from_slice(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(?path, error = %e, "ArtifactStore::read: discarding unparseable artifact");
                Ok(None)
            }
        }
    }

    /// `true` iff an artifact of `kind` has been saved for this item since
    /// the last `clear`.
    pub fn has(&self, owner: &str, repo: &str, issue_number: u64, kind: ArtifactKind) -> bool {
        self.artifact_path(owner, repo, issue_number, kind).exists()
    }

    /// Remove every artifact recorded for `(owner, repo, issue_number)`,
    /// e.g. when the work item reaches `done`. Tolerant of a missing
    /// directory.
    pub fn clear(&self, owner: &str, repo: &str, issue_number: u64) -> Result<(), ArtifactStoreError> {
        let dir = self.issue_dir(owner, repo, issue_number);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArtifactStoreError::Io { path: dir, source: e }),
        }
    }
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<(), ArtifactStoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| ArtifactStoreError::Io { path: path.to_path_buf(), source: e })
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<(), ArtifactStoreError> {
    Ok(())
}
