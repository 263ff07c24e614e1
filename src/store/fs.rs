//! Filesystem result store: one directory per key below a results root.
//!
//! The key directory is handed to the simulator as its output directory, so
//! the artifact lands at `<root>/<key>/stats.txt` without a copy. Status
//! records are written to a temporary file and renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ResultKey, ResultStore, ARTIFACT_FILE, RECORD_FILE};
use crate::experiment::SimulationResult;
use crate::{Error, Result};

/// Directory-backed result store.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    root: PathBuf,
}

impl FsResultStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory of a key.
    #[must_use]
    pub fn dir(&self, key: &ResultKey) -> PathBuf {
        key.under(&self.root)
    }

    /// Path of a key's artifact.
    #[must_use]
    pub fn artifact_path(&self, key: &ResultKey) -> PathBuf {
        self.dir(key).join(ARTIFACT_FILE)
    }

    fn record_path(&self, key: &ResultKey) -> PathBuf {
        self.dir(key).join(RECORD_FILE)
    }

    /// Remove the whole results tree.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the tree exists but cannot be removed.
    pub async fn wipe(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StoreError(format!(
                "Failed to remove results root {}: {e}",
                self.root.display()
            ))),
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::StoreError(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

async fn remove_optional(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::StoreError(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}

/// Write `bytes` next to `path` and rename over it.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::StoreError(format!("Invalid store path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    tokio::fs::write(&tmp, bytes).await.map_err(|e| {
        Error::StoreError(format!("Failed to write {}: {e}", tmp.display()))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        Error::StoreError(format!("Failed to move {} into place: {e}", path.display()))
    })
}

impl ResultStore for FsResultStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn prepare(&self, key: &ResultKey) -> Result<()> {
        let dir = self.dir(key);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::StoreError(format!("Failed to create {}: {e}", dir.display()))
        })
    }

    async fn put(&self, key: &ResultKey, artifact: Vec<u8>) -> Result<()> {
        self.prepare(key).await?;
        write_atomic(&self.artifact_path(key), &artifact).await
    }

    async fn get(&self, key: &ResultKey) -> Result<Option<Vec<u8>>> {
        read_optional(&self.artifact_path(key)).await
    }

    async fn exists(&self, key: &ResultKey) -> Result<bool> {
        tokio::fs::try_exists(self.artifact_path(key))
            .await
            .map_err(|e| Error::StoreError(format!("Failed to stat artifact of {key}: {e}")))
    }

    async fn delete(&self, key: &ResultKey) -> Result<()> {
        remove_optional(&self.artifact_path(key)).await?;
        remove_optional(&self.record_path(key)).await
    }

    async fn put_record(&self, key: &ResultKey, record: &SimulationResult) -> Result<()> {
        self.prepare(key).await?;
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.record_path(key), &bytes).await
    }

    async fn record(&self, key: &ResultKey) -> Result<Option<SimulationResult>> {
        match read_optional(&self.record_path(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
