//! Experiment data model
//!
//! Pure data: nothing here touches a process or the filesystem.
//!
//! ## Schema Overview
//!
//! ```text
//! CellKey (mesh, pattern, VCs, routing, swap policy)
//!    │
//!    └──< ExperimentPoint (cell + injection rate)  ── one simulator run
//!              │
//!              └── SimulationResult (status, artifact key, metrics)
//!
//! SearchTrace (1 per cell) ──< SimulationResult (N, increasing rate)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use noc_saturation::experiment::{
//!     CellKey, InjectionRate, MeshSize, RoutingAlgorithm, SwapPolicy, TrafficPattern,
//! };
//!
//! let cell = CellKey::new(
//!     MeshSize::new(64, 8),
//!     TrafficPattern::Shuffle,
//!     4,
//!     RoutingAlgorithm::AdaptRand,
//! )
//! .with_swap(SwapPolicy::reference());
//!
//! let point = cell.at(InjectionRate::from_hundredths(2)?);
//! assert_eq!(point.injection_rate().formatted(), "0.02");
//! # Ok::<(), noc_saturation::Error>(())
//! ```

mod options;
mod point;
mod rate;
mod result;
mod trace;

pub use options::{
    MeshSize, NetworkMode, RoutingAlgorithm, SwapPolicy, TrafficPattern, WhenToSwap, WhichToSwap,
};
pub use point::{CellKey, ExperimentPoint};
pub use rate::InjectionRate;
pub use result::{SimulationResult, SimulationStatus};
pub use trace::{FailureReason, SearchOutcome, SearchTrace};
