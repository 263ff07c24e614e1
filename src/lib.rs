//! # noc-saturation: Saturation Sweeps for Mesh Networks-on-Chip
//!
//! **Version**: 0.1.0
//!
//! Finds the injection rate at which packet latency diverges for every
//! combination of mesh size, traffic pattern, virtual-channel count, routing
//! algorithm and router port-swap policy. Each run is delegated to an
//! external cycle-accurate simulator (gem5 with the garnet2.0 network);
//! this crate derives its configuration, drives the per-cell rate search,
//! and keeps the results in a layout that later passes can re-read without
//! simulating again.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: Inconsistent swap policies are rejected before a
//!   simulator is ever started
//! - **Jidoka**: A failed run stops its cell and is reported, never retried
//! - **Genchi Genbutsu**: Success is a status record written next to the
//!   artifact, not inferred from a directory existing
//! - **Muda elimination**: Results already in the store are reused
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use noc_saturation::config::SweepConfig;
//! use noc_saturation::runner::{ProcessSimulator, SimulationRunner};
//! use noc_saturation::search::SaturationSearch;
//! use noc_saturation::store::FsResultStore;
//! use noc_saturation::sweep::SweepOrchestrator;
//!
//! # async fn example() -> noc_saturation::Result<()> {
//! let config = SweepConfig::load(None)?;
//! let store = Arc::new(FsResultStore::new(&config.results_root));
//! let simulator = Arc::new(ProcessSimulator::new(config.timeout()));
//! let runner = SimulationRunner::new(store, simulator);
//! let search = SaturationSearch::new(config.translator(), runner, config.search.clone());
//!
//! let report = SweepOrchestrator::new(search, config.resolved_workers())
//!     .run(&config.axes)
//!     .await;
//! for trace in report.traces() {
//!     println!("{}: {}", trace.cell(), trace.outcome());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod experiment;
pub mod extract;
pub mod harvest;
pub mod runner;
pub mod search;
pub mod store;
pub mod sweep;
pub mod translate;

pub use error::{Error, ExtractionError, Result};
