//! In-memory result store using `DashMap`.
//!
//! Data is lost on process restart. Used for tests and dry runs with
//! simulators that do not need a real output directory.

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use super::{ResultKey, ResultStore};
use crate::experiment::SimulationResult;
use crate::Result;

/// In-memory result store using lock-free concurrent hashmaps.
///
/// Thread-safe; cells running on different tasks write disjoint keys.
///
/// # Example
///
/// ```rust
/// use noc_saturation::store::MemoryResultStore;
///
/// let store = MemoryResultStore::new();
/// assert!(store.is_empty());
/// ```
pub struct MemoryResultStore {
    root: PathBuf,
    artifacts: DashMap<ResultKey, Vec<u8>>,
    records: DashMap<ResultKey, SimulationResult>,
}

impl MemoryResultStore {
    /// Create a new in-memory store with a virtual root of `results`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("results")
    }

    /// Create with a virtual root; keys resolve below it for simulators that
    /// want an output path.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            artifacts: DashMap::new(),
            records: DashMap::new(),
        }
    }

    /// Get the number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Check if no artifact is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Clear all artifacts and records.
    pub fn clear(&self) {
        self.artifacts.clear();
        self.records.clear();
    }
}

impl Default for MemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore for MemoryResultStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn prepare(&self, _key: &ResultKey) -> Result<()> {
        Ok(())
    }

    async fn put(&self, key: &ResultKey, artifact: Vec<u8>) -> Result<()> {
        self.artifacts.insert(key.clone(), artifact);
        Ok(())
    }

    async fn get(&self, key: &ResultKey) -> Result<Option<Vec<u8>>> {
        Ok(self.artifacts.get(key).map(|v| v.value().clone()))
    }

    async fn exists(&self, key: &ResultKey) -> Result<bool> {
        Ok(self.artifacts.contains_key(key))
    }

    async fn delete(&self, key: &ResultKey) -> Result<()> {
        self.artifacts.remove(key);
        self.records.remove(key);
        Ok(())
    }

    async fn put_record(&self, key: &ResultKey, record: &SimulationResult) -> Result<()> {
        self.records.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn record(&self, key: &ResultKey) -> Result<Option<SimulationResult>> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }
}
