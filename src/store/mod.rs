//! Result Store Module
//!
//! Durable, key-addressed persistence of simulator artifacts and their status
//! records. Keys are derived from experiment points only (see [`ResultKey`]),
//! so a later extraction pass finds prior results without re-simulating.
//!
//! Each key holds two things:
//! - the simulator's artifact (the text stats report)
//! - a [`SimulationResult`] record, the explicit statement of whether that
//!   run succeeded
//!
//! At most one task ever writes a given key (every experiment point is
//! simulated at most once per sweep), so the store needs no locking beyond
//! its own write atomicity.
//!
//! # Example
//!
//! ```rust,no_run
//! use noc_saturation::store::{MemoryResultStore, ResultStore};
//! use noc_saturation::experiment::{
//!     CellKey, InjectionRate, MeshSize, RoutingAlgorithm, TrafficPattern,
//! };
//!
//! # async fn example() -> noc_saturation::Result<()> {
//! let store = MemoryResultStore::new();
//! let point = CellKey::new(MeshSize::new(64, 8), TrafficPattern::Shuffle, 4, RoutingAlgorithm::Xy)
//!     .at(InjectionRate::from_hundredths(2)?);
//! let key = store.key(&point);
//!
//! store.put(&key, b"system.ruby.network.average_packet_latency 12.5\n".to_vec()).await?;
//! assert!(store.exists(&key).await?);
//! # Ok(())
//! # }
//! ```

mod fs;
mod key;
mod memory;

pub use fs::FsResultStore;
pub use key::ResultKey;
pub use memory::MemoryResultStore;

use crate::experiment::{ExperimentPoint, SimulationResult};
use crate::Result;
use std::future::Future;
use std::path::Path;

/// File name of the simulator's stats report inside a key directory.
pub const ARTIFACT_FILE: &str = "stats.txt";

/// File name of the status record inside a key directory.
pub const RECORD_FILE: &str = "result.json";

/// Key-addressed storage for artifacts and status records.
pub trait ResultStore: Send + Sync {
    /// Root every key is resolved under.
    fn root(&self) -> &Path;

    /// Canonical key of a point.
    fn key(&self, point: &ExperimentPoint) -> ResultKey {
        ResultKey::for_point(point)
    }

    /// Make the key ready to receive a simulator's output.
    fn prepare(&self, key: &ResultKey) -> impl Future<Output = Result<()>> + Send;

    /// Store an artifact. Overwrites any existing artifact.
    fn put(&self, key: &ResultKey, artifact: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    /// Read an artifact.
    ///
    /// Returns `None` if no artifact is stored under the key.
    fn get(&self, key: &ResultKey) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Check if an artifact is stored under the key.
    fn exists(&self, key: &ResultKey) -> impl Future<Output = Result<bool>> + Send;

    /// Remove the artifact and record of a key.
    ///
    /// No-op if nothing is stored.
    fn delete(&self, key: &ResultKey) -> impl Future<Output = Result<()>> + Send;

    /// Store the status record of a key, atomically replacing the old one.
    fn put_record(
        &self,
        key: &ResultKey,
        record: &SimulationResult,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Read the status record of a key.
    fn record(&self, key: &ResultKey)
        -> impl Future<Output = Result<Option<SimulationResult>>> + Send;
}
