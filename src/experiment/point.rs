//! Experiment Point - one simulator invocation, and the sweep cell it belongs to

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{InjectionRate, MeshSize, RoutingAlgorithm, SwapPolicy, TrafficPattern};

/// A sweep grid cell: every experiment parameter except the injection rate.
///
/// One saturation search runs per cell; the rate is driven by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    mesh: MeshSize,
    pattern: TrafficPattern,
    vcs: u32,
    routing: RoutingAlgorithm,
    swap: SwapPolicy,
}

impl CellKey {
    /// Create a cell with port swapping disabled.
    ///
    /// # Arguments
    ///
    /// * `mesh` - Core count and mesh rows
    /// * `pattern` - Synthetic traffic pattern
    /// * `vcs` - Virtual channels per virtual network
    /// * `routing` - Routing algorithm
    #[must_use]
    pub const fn new(
        mesh: MeshSize,
        pattern: TrafficPattern,
        vcs: u32,
        routing: RoutingAlgorithm,
    ) -> Self {
        Self {
            mesh,
            pattern,
            vcs,
            routing,
            swap: SwapPolicy::disabled(),
        }
    }

    /// Replace the swap policy.
    #[must_use]
    pub const fn with_swap(mut self, swap: SwapPolicy) -> Self {
        self.swap = swap;
        self
    }

    /// Get the mesh shape.
    #[must_use]
    pub const fn mesh(&self) -> MeshSize {
        self.mesh
    }

    /// Get the traffic pattern.
    #[must_use]
    pub const fn pattern(&self) -> TrafficPattern {
        self.pattern
    }

    /// Get the VC count.
    #[must_use]
    pub const fn vcs(&self) -> u32 {
        self.vcs
    }

    /// Get the routing algorithm.
    #[must_use]
    pub const fn routing(&self) -> RoutingAlgorithm {
        self.routing
    }

    /// Get the swap policy.
    #[must_use]
    pub const fn swap(&self) -> SwapPolicy {
        self.swap
    }

    /// The point of this cell at `rate`.
    #[must_use]
    pub const fn at(&self, rate: InjectionRate) -> ExperimentPoint {
        ExperimentPoint { cell: *self, rate }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cores={} rows={} pattern={} vc={} routing={}",
            self.mesh.cores, self.mesh.rows, self.pattern, self.vcs, self.routing
        )?;
        if let Some(tag) = self.swap.tag() {
            write!(f, " {tag}")?;
        }
        Ok(())
    }
}

/// A fully specified experiment point; identifies exactly one simulator run.
///
/// Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExperimentPoint {
    cell: CellKey,
    rate: InjectionRate,
}

impl ExperimentPoint {
    /// Get the sweep cell.
    #[must_use]
    pub const fn cell(&self) -> &CellKey {
        &self.cell
    }

    /// Get the core (router) count.
    #[must_use]
    pub const fn network_size(&self) -> u32 {
        self.cell.mesh.cores
    }

    /// Get the number of mesh rows.
    #[must_use]
    pub const fn row_count(&self) -> u32 {
        self.cell.mesh.rows
    }

    /// Get the traffic pattern.
    #[must_use]
    pub const fn traffic_pattern(&self) -> TrafficPattern {
        self.cell.pattern
    }

    /// Get the VC count.
    #[must_use]
    pub const fn vc_count(&self) -> u32 {
        self.cell.vcs
    }

    /// Get the routing algorithm.
    #[must_use]
    pub const fn routing_algorithm(&self) -> RoutingAlgorithm {
        self.cell.routing
    }

    /// Get the swap policy.
    #[must_use]
    pub const fn swap_policy(&self) -> SwapPolicy {
        self.cell.swap
    }

    /// Get the injection rate.
    #[must_use]
    pub const fn injection_rate(&self) -> InjectionRate {
        self.rate
    }
}

impl fmt::Display for ExperimentPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} inj={}", self.cell, self.rate)
    }
}
