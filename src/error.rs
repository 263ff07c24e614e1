//! Error types for noc-saturation
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Simulator failures and timeouts are not errors: they are recorded as a
//! [`SimulationStatus`](crate::experiment::SimulationStatus) on the result so a
//! sweep always produces a complete trace per cell.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// noc-saturation error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment point or simulator settings are mutually inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Metric could not be read from a simulator artifact
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Result store could not be read or written
    #[error("Result store error: {0}")]
    StoreError(String),

    /// Sweep configuration could not be loaded or failed validation
    #[error("Configuration error: {0}\nCheck the --config file, NOC_SWEEP_* variables and CLI flags.")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Status record (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Failure to read a named metric out of a simulator artifact.
///
/// These indicate a format mismatch (or a truncated artifact), as opposed to a
/// simulator crash, and are reported separately from simulation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// No line carries the metric key
    #[error("Metric '{metric}' not found in artifact")]
    MetricNotFound {
        /// Metric name that was looked up
        metric: String,
    },

    /// Several lines carry the metric key with different values
    #[error("Metric '{metric}' is ambiguous: found differing values {values:?}")]
    MetricAmbiguous {
        /// Metric name that was looked up
        metric: String,
        /// Raw values of every matching line
        values: Vec<String>,
    },

    /// The matched value is not a finite floating-point number
    #[error("Metric '{metric}' is malformed: cannot parse '{raw}' as a number")]
    MetricMalformed {
        /// Metric name that was looked up
        metric: String,
        /// Text found after the key
        raw: String,
    },

    /// No artifact is stored under the key
    #[error("No artifact stored at '{key}'")]
    ArtifactMissing {
        /// Result-store key that was read
        key: String,
    },
}
