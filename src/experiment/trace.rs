//! Search Trace - ordered samples of one saturation search

use serde::{Deserialize, Serialize};

use super::{CellKey, InjectionRate, SimulationResult};
use crate::ExtractionError;

/// Why a cell's search ended without a usable measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The cell cannot be translated into a simulator invocation.
    InvalidConfiguration {
        /// Translator message
        message: String,
    },
    /// The simulator failed at `rate`.
    SimulationFailed {
        /// Rate of the failed sample
        rate: InjectionRate,
        /// Captured diagnostic output
        detail: String,
    },
    /// The simulator was killed after exceeding its wall-clock budget.
    Timeout {
        /// Rate of the timed-out sample
        rate: InjectionRate,
    },
    /// The artifact at `rate` did not yield the primary metric.
    Extraction {
        /// Rate of the unreadable sample
        rate: InjectionRate,
        /// Extraction failure
        error: ExtractionError,
    },
    /// The result store could not be read or written.
    Store {
        /// Store error message
        message: String,
    },
    /// The search task died without producing a trace.
    Aborted {
        /// Join error message
        message: String,
    },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfiguration { message } => write!(f, "invalid configuration: {message}"),
            Self::SimulationFailed { rate, detail } => {
                write!(f, "simulation failed at inj={rate}: {detail}")
            }
            Self::Timeout { rate } => write!(f, "simulation timed out at inj={rate}"),
            Self::Extraction { rate, error } => write!(f, "extraction failed at inj={rate}: {error}"),
            Self::Store { message } => write!(f, "result store: {message}"),
            Self::Aborted { message } => write!(f, "search task aborted: {message}"),
        }
    }
}

/// How a cell's search terminated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Latency reached the ceiling at `rate`.
    Saturated {
        /// First rate whose latency reached the ceiling
        rate: InjectionRate,
        /// Latency measured at `rate`
        latency: f64,
    },
    /// The iteration or rate budget ran out below the ceiling.
    NoSaturationFound {
        /// Highest rate sampled, if any
        last_rate: Option<InjectionRate>,
    },
    /// The search was aborted by a failure.
    Failed(FailureReason),
    /// The search was cancelled before finishing.
    Cancelled,
}

impl SearchOutcome {
    /// Whether this outcome counts as an orchestrator failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Saturated { rate, latency } => {
                write!(f, "saturated at inj={rate} (latency={latency:.6})")
            }
            Self::NoSaturationFound {
                last_rate: Some(rate),
            } => write!(f, "no saturation found up to inj={rate}"),
            Self::NoSaturationFound { last_rate: None } => f.write_str("no saturation found"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Search Trace holds the samples of one cell, strictly increasing in rate.
///
/// Once a sample's latency reaches the ceiling, or a sample fails, the trace
/// is terminal and no further rates are tried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTrace {
    cell: CellKey,
    samples: Vec<SimulationResult>,
    outcome: SearchOutcome,
}

impl SearchTrace {
    /// Create a finished trace.
    ///
    /// `samples` must already be in strictly increasing rate order.
    #[must_use]
    pub fn new(cell: CellKey, samples: Vec<SimulationResult>, outcome: SearchOutcome) -> Self {
        debug_assert!(samples
            .windows(2)
            .all(|w| w[0].point().injection_rate() < w[1].point().injection_rate()));
        Self {
            cell,
            samples,
            outcome,
        }
    }

    /// Create a trace for a cell that never got to run.
    #[must_use]
    pub const fn cancelled(cell: CellKey) -> Self {
        Self {
            cell,
            samples: Vec::new(),
            outcome: SearchOutcome::Cancelled,
        }
    }

    /// Get the cell.
    #[must_use]
    pub const fn cell(&self) -> &CellKey {
        &self.cell
    }

    /// Get the samples, in increasing rate order.
    #[must_use]
    pub fn samples(&self) -> &[SimulationResult] {
        &self.samples
    }

    /// Get the outcome.
    #[must_use]
    pub const fn outcome(&self) -> &SearchOutcome {
        &self.outcome
    }

    /// Sampled rates, in order.
    #[must_use]
    pub fn rates(&self) -> Vec<InjectionRate> {
        self.samples
            .iter()
            .map(|s| s.point().injection_rate())
            .collect()
    }

    /// The last sample below the ceiling and the first at or above it.
    ///
    /// `None` unless the search saturated after at least two samples.
    #[must_use]
    pub fn saturation_bracket(&self) -> Option<(&SimulationResult, &SimulationResult)> {
        if !matches!(self.outcome, SearchOutcome::Saturated { .. }) {
            return None;
        }
        match self.samples.as_slice() {
            [.., below, above] => Some((below, above)),
            _ => None,
        }
    }
}
