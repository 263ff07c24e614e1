//! Simulation Result - outcome of one simulator invocation

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExperimentPoint;
use crate::store::ResultKey;

/// Status of a simulator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    /// Process exited 0 and left an artifact.
    Success,
    /// Process exited non-zero, could not be spawned, or left no artifact.
    Failed,
    /// Process exceeded its wall-clock budget and was killed.
    Timeout,
}

/// Simulation Result represents a single simulator invocation.
///
/// Created by the runner, enriched once with extracted metrics, and
/// persisted next to the artifact as the explicit record of whether the run
/// succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    point: ExperimentPoint,
    status: SimulationStatus,
    artifact: ResultKey,
    metrics: BTreeMap<String, f64>,
    diagnostic: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
}

impl SimulationResult {
    /// Create a result with no metrics.
    ///
    /// # Arguments
    ///
    /// * `point` - The simulated experiment point
    /// * `status` - Final status of the invocation
    /// * `artifact` - Result-store key of the artifact
    /// * `started_at` - When the process was started
    #[must_use]
    pub fn new(
        point: ExperimentPoint,
        status: SimulationStatus,
        artifact: ResultKey,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            point,
            status,
            artifact,
            metrics: BTreeMap::new(),
            diagnostic: None,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Attach captured diagnostic output.
    #[must_use]
    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    /// Attach extracted metrics, replacing any previous set.
    #[must_use]
    pub fn with_metrics(mut self, metrics: BTreeMap<String, f64>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get the experiment point.
    #[must_use]
    pub const fn point(&self) -> &ExperimentPoint {
        &self.point
    }

    /// Get the status.
    #[must_use]
    pub const fn status(&self) -> SimulationStatus {
        self.status
    }

    /// Whether the invocation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SimulationStatus::Success
    }

    /// Get the artifact key.
    #[must_use]
    pub const fn artifact(&self) -> &ResultKey {
        &self.artifact
    }

    /// Get all extracted metrics.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    /// Get one extracted metric.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Get the captured diagnostic output, if any.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
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
}
