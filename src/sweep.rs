//! Sweep orchestration: one saturation search per grid cell.
//!
//! Cells are independent and run concurrently, bounded by a worker count;
//! rates within a cell stay sequential inside [`SaturationSearch`]. A failed
//! cell never stops the others, and a shutdown signal aborts every
//! outstanding cell (killing its simulator) and reports it as cancelled.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::experiment::{
    CellKey, FailureReason, InjectionRate, MeshSize, RoutingAlgorithm, SearchOutcome, SearchTrace,
    SwapPolicy, TrafficPattern,
};
use crate::runner::Simulator;
use crate::search::SaturationSearch;
use crate::store::{ResultKey, ResultStore};
use crate::{Error, Result};

/// Values swept for each non-rate field of an experiment point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepAxes {
    /// Mesh shapes
    pub meshes: Vec<MeshSize>,
    /// Traffic patterns
    pub patterns: Vec<TrafficPattern>,
    /// Virtual channels per virtual network
    pub vcs: Vec<u32>,
    /// Routing algorithms
    pub routing: Vec<RoutingAlgorithm>,
    /// Port-swap policies
    pub swap_policies: Vec<SwapPolicy>,
}

impl Default for SweepAxes {
    fn default() -> Self {
        Self {
            meshes: vec![MeshSize::new(64, 8), MeshSize::new(256, 16)],
            patterns: vec![
                TrafficPattern::BitRotation,
                TrafficPattern::Shuffle,
                TrafficPattern::Transpose,
            ],
            vcs: vec![4],
            routing: vec![RoutingAlgorithm::AdaptRand],
            swap_policies: vec![SwapPolicy::reference()],
        }
    }
}

impl SweepAxes {
    /// Distinct grid cells in axis order: mesh, pattern, VCs, routing, swap
    /// policy. A value repeated on an axis yields its cells once.
    #[must_use]
    pub fn cells(&self) -> Vec<CellKey> {
        let mut seen = HashSet::new();
        let mut cells = Vec::new();
        for &mesh in &self.meshes {
            for &pattern in &self.patterns {
                for &vcs in &self.vcs {
                    for &routing in &self.routing {
                        for &swap in &self.swap_policies {
                            let cell = CellKey::new(mesh, pattern, vcs, routing).with_swap(swap);
                            if seen.insert(cell) {
                                cells.push(cell);
                            }
                        }
                    }
                }
            }
        }
        cells
    }

    /// Number of distinct grid cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells().len()
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
            || self.patterns.is_empty()
            || self.vcs.is_empty()
            || self.routing.is_empty()
            || self.swap_policies.is_empty()
    }

    /// Reject empty axes, values repeated on an axis, and distinct cells that
    /// share a result location (the layout keys meshes by core count only).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the offending axis or cells.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("meshes", self.meshes.len()),
            ("patterns", self.patterns.len()),
            ("vcs", self.vcs.len()),
            ("routing", self.routing.len()),
            ("swap_policies", self.swap_policies.len()),
        ];
        if let Some((axis, _)) = sizes.iter().find(|(_, len)| *len == 0) {
            return Err(Error::ConfigError(format!("sweep axis '{axis}' is empty")));
        }

        reject_repeats("meshes", &self.meshes)?;
        reject_repeats("patterns", &self.patterns)?;
        reject_repeats("vcs", &self.vcs)?;
        reject_repeats("routing", &self.routing)?;
        reject_repeats("swap_policies", &self.swap_policies)?;

        // Keys differ between cells only above the rate segment, so one rate suffices
        let mut owners: HashMap<ResultKey, CellKey> = HashMap::new();
        for cell in self.cells() {
            let key = ResultKey::for_point(&cell.at(InjectionRate::DEFAULT_STEP));
            if let Some(other) = owners.insert(key, cell) {
                return Err(Error::ConfigError(format!(
                    "cells '{other}' and '{cell}' would share result locations"
                )));
            }
        }
        Ok(())
    }
}

fn reject_repeats<T: PartialEq + fmt::Debug>(axis: &str, values: &[T]) -> Result<()> {
    for (i, value) in values.iter().enumerate() {
        if values[..i].contains(value) {
            return Err(Error::ConfigError(format!(
                "sweep axis '{axis}' lists {value:?} more than once"
            )));
        }
    }
    Ok(())
}

/// Aggregate result of a sweep: one trace per cell, in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    interrupted: bool,
    traces: Vec<SearchTrace>,
}

impl Report {
    /// Get the traces, in grid order.
    #[must_use]
    pub fn traces(&self) -> &[SearchTrace] {
        &self.traces
    }

    /// Find the trace of one cell.
    #[must_use]
    pub fn trace(&self, cell: &CellKey) -> Option<&SearchTrace> {
        self.traces.iter().find(|t| t.cell() == cell)
    }

    /// Whether any cell failed outright. `NoSaturationFound` is not a failure.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.traces.iter().any(|t| t.outcome().is_failure())
    }

    /// Whether the sweep was stopped by a shutdown signal.
    #[must_use]
    pub const fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Number of cells that saturated.
    #[must_use]
    pub fn saturated(&self) -> usize {
        self.count(|o| matches!(o, SearchOutcome::Saturated { .. }))
    }

    /// Number of cells that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(SearchOutcome::is_failure)
    }

    /// Number of cancelled cells.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, SearchOutcome::Cancelled))
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the end timestamp.
    #[must_use]
    pub const fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    fn count(&self, pred: impl Fn(&SearchOutcome) -> bool) -> usize {
        self.traces.iter().filter(|t| pred(t.outcome())).count()
    }
}

/// Runs saturation searches over a sweep grid.
pub struct SweepOrchestrator<S, X> {
    search: SaturationSearch<S, X>,
    workers: usize,
}

impl<S, X> SweepOrchestrator<S, X>
where
    S: ResultStore + 'static,
    X: Simulator + 'static,
{
    /// Create an orchestrator running at most `workers` cells at once.
    #[must_use]
    pub fn new(search: SaturationSearch<S, X>, workers: usize) -> Self {
        Self {
            search,
            workers: workers.max(1),
        }
    }

    /// Get the worker count.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Search every cell of `axes` to completion.
    pub async fn run(&self, axes: &SweepAxes) -> Report {
        self.run_until(axes, std::future::pending()).await
    }

    /// Search every cell of `axes` until `shutdown` resolves.
    ///
    /// On shutdown, cells still running or queued are aborted, their child
    /// processes killed, and their traces reported as cancelled. Cells that
    /// already finished keep their outcome.
    pub async fn run_until(&self, axes: &SweepAxes, shutdown: impl Future<Output = ()>) -> Report {
        let started_at = Utc::now();
        let cells = axes.cells();
        info!(cells = cells.len(), workers = self.workers, "starting sweep");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let mut pending: BTreeMap<usize, CellKey> = BTreeMap::new();
        for (index, cell) in cells.into_iter().enumerate() {
            pending.insert(index, cell);
            let search = self.search.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, search.search(cell).await)
            });
        }

        let mut finished: BTreeMap<usize, SearchTrace> = BTreeMap::new();
        let mut interrupted = false;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((index, trace))) => {
                        pending.remove(&index);
                        info!(cell = %trace.cell(), outcome = %trace.outcome(), "cell finished");
                        finished.insert(index, trace);
                    }
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => error!(error = %e, "search task panicked"),
                },
                () = &mut shutdown, if !interrupted => {
                    warn!(outstanding = pending.len(), "shutdown requested, cancelling cells");
                    interrupted = true;
                    tasks.abort_all();
                }
            }
        }

        for (index, cell) in pending {
            let trace = if interrupted {
                SearchTrace::cancelled(cell)
            } else {
                let reason = FailureReason::Aborted {
                    message: "search task panicked".to_string(),
                };
                SearchTrace::new(cell, Vec::new(), SearchOutcome::Failed(reason))
            };
            finished.insert(index, trace);
        }

        let report = Report {
            started_at,
            ended_at: Utc::now(),
            interrupted,
            traces: finished.into_values().collect(),
        };
        info!(
            saturated = report.saturated(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            "sweep finished"
        );
        report
    }
}
