//! Simulation Runner Module
//!
//! Runs one simulator invocation and turns it into a persisted
//! [`SimulationResult`]. The runner never interprets metrics: it only decides
//! between `Success`, `Failed` and `Timeout`.
//!
//! ```text
//! clear key ─> prepare key ─> Simulator::simulate ─> artifact present? ─> put_record
//! ```
//!
//! The process boundary sits behind the [`Simulator`] trait so searches can be
//! driven by an in-process stub in tests.

mod process;

pub use process::{ProcessSimulator, DIAGNOSTIC_TAIL_BYTES};

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::experiment::{SimulationResult, SimulationStatus};
use crate::store::ResultStore;
use crate::translate::SimulatorInvocation;
use crate::Result;

/// What a simulator reported for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    status: SimulationStatus,
    diagnostic: Option<String>,
}

impl RunOutcome {
    /// The process exited cleanly.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            status: SimulationStatus::Success,
            diagnostic: None,
        }
    }

    /// The process failed, with captured output.
    #[must_use]
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            status: SimulationStatus::Failed,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// The process was killed after exceeding its budget.
    #[must_use]
    pub fn timeout(diagnostic: impl Into<String>) -> Self {
        Self {
            status: SimulationStatus::Timeout,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// Get the status.
    #[must_use]
    pub const fn status(&self) -> SimulationStatus {
        self.status
    }

    /// Get the diagnostic output, if any.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }
}

/// Something that executes simulator invocations.
///
/// Implementations write their artifact to the invocation's output location
/// and must not panic on simulator misbehaviour: every problem is a
/// [`RunOutcome`].
pub trait Simulator: Send + Sync {
    /// Run one invocation to completion.
    fn simulate(&self, invocation: &SimulatorInvocation)
        -> impl Future<Output = RunOutcome> + Send;
}

/// Runs invocations against a simulator and records their status.
pub struct SimulationRunner<S, X> {
    store: Arc<S>,
    simulator: Arc<X>,
}

impl<S, X> Clone for SimulationRunner<S, X> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            simulator: Arc::clone(&self.simulator),
        }
    }
}

impl<S: ResultStore, X: Simulator> SimulationRunner<S, X> {
    /// Create a runner.
    #[must_use]
    pub const fn new(store: Arc<S>, simulator: Arc<X>) -> Self {
        Self { store, simulator }
    }

    /// Get the result store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one invocation.
    ///
    /// A zero exit that leaves no artifact is recorded as `Failed`. Simulator
    /// failures are statuses on the returned result, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error only if the result store cannot be cleared, prepared
    /// or written.
    pub async fn run(&self, invocation: &SimulatorInvocation) -> Result<SimulationResult> {
        let key = invocation.key();
        self.store.delete(key).await?;
        self.store.prepare(key).await?;

        debug!(%key, command = %invocation.command_line(), "starting simulator");
        let started_at = Utc::now();
        let outcome = self.simulator.simulate(invocation).await;

        let mut status = outcome.status();
        let mut diagnostic = outcome.diagnostic().map(str::to_string);
        if status == SimulationStatus::Success && !self.store.exists(key).await? {
            status = SimulationStatus::Failed;
            diagnostic = Some(format!("simulator exited 0 but left no artifact at '{key}'"));
        }

        let mut result = SimulationResult::new(*invocation.point(), status, key.clone(), started_at);
        if let Some(diagnostic) = diagnostic {
            if status != SimulationStatus::Success {
                warn!(%key, ?status, %diagnostic, "simulation did not succeed");
            }
            result = result.with_diagnostic(diagnostic);
        }
        self.store.put_record(key, &result).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{CellKey, InjectionRate, MeshSize, RoutingAlgorithm, TrafficPattern};
    use crate::store::MemoryResultStore;
    use crate::translate::{ConfigTranslator, SimulatorSettings};

    /// Reports a fixed outcome, optionally writing an artifact first.
    struct Scripted {
        store: Arc<MemoryResultStore>,
        outcome: RunOutcome,
        writes_artifact: bool,
    }

    impl Simulator for Scripted {
        async fn simulate(&self, invocation: &SimulatorInvocation) -> RunOutcome {
            if self.writes_artifact {
                self.store
                    .put(invocation.key(), b"system.ruby.network.average_packet_latency 20\n".to_vec())
                    .await
                    .unwrap();
            }
            self.outcome.clone()
        }
    }

    fn invocation() -> SimulatorInvocation {
        let point = CellKey::new(MeshSize::new(64, 8), TrafficPattern::Shuffle, 4, RoutingAlgorithm::Xy)
            .at(InjectionRate::from_hundredths(2).unwrap());
        ConfigTranslator::new(SimulatorSettings::default(), "results")
            .translate(&point)
            .unwrap()
    }

    fn runner(outcome: RunOutcome, writes_artifact: bool) -> SimulationRunner<MemoryResultStore, Scripted> {
        let store = Arc::new(MemoryResultStore::new());
        let simulator = Arc::new(Scripted {
            store: Arc::clone(&store),
            outcome,
            writes_artifact,
        });
        SimulationRunner::new(store, simulator)
    }

    #[tokio::test]
    async fn test_success_is_recorded() {
        let runner = runner(RunOutcome::success(), true);
        let invocation = invocation();

        let result = runner.run(&invocation).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.artifact(), invocation.key());
        let record = runner.store().record(invocation.key()).await.unwrap();
        assert_eq!(record, Some(result));
    }

    #[tokio::test]
    async fn test_zero_exit_without_artifact_is_failed() {
        let runner = runner(RunOutcome::success(), false);

        let result = runner.run(&invocation()).await.unwrap();

        assert_eq!(result.status(), SimulationStatus::Failed);
        assert!(result.diagnostic().unwrap().contains("left no artifact"));
    }

    #[tokio::test]
    async fn test_failure_keeps_diagnostic() {
        let runner = runner(RunOutcome::failed("panic: router deadlock"), true);

        let result = runner.run(&invocation()).await.unwrap();

        assert_eq!(result.status(), SimulationStatus::Failed);
        assert_eq!(result.diagnostic(), Some("panic: router deadlock"));
    }

    #[tokio::test]
    async fn test_stale_artifact_is_cleared_before_run() {
        let runner = runner(RunOutcome::success(), false);
        let invocation = invocation();
        runner
            .store()
            .put(invocation.key(), b"stale".to_vec())
            .await
            .unwrap();

        let result = runner.run(&invocation).await.unwrap();

        // The stale artifact must not count as this run's output
        assert_eq!(result.status(), SimulationStatus::Failed);
    }
}
