//! Saturation search for one sweep cell.
//!
//! Walks the injection rate upward from `rate_start` in `rate_step`
//! increments, one simulator run per rate, until the primary metric reaches
//! the latency ceiling. The walk is bounded by `max_iterations` and by the
//! 1.00 rate limit, and a failed sample ends it: failures are reported, never
//! retried.
//!
//! Rates whose key already holds a `Success` record are reused instead of
//! re-simulated, so searching a finished cell again is free and yields the
//! same trace.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::experiment::{
    CellKey, FailureReason, InjectionRate, SearchOutcome, SearchTrace, SimulationResult,
    SimulationStatus,
};
use crate::extract::{MetricExtractor, AVERAGE_PACKET_LATENCY};
use crate::runner::{SimulationRunner, Simulator};
use crate::store::ResultStore;
use crate::translate::{ConfigTranslator, SimulatorInvocation};
use crate::{Error, Result};

/// Search bounds and stopping rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// First rate sampled
    pub rate_start: InjectionRate,
    /// Rate increment between samples
    pub rate_step: InjectionRate,
    /// Primary metric value at which the cell counts as saturated
    pub latency_ceiling: f64,
    /// Maximum samples per cell
    pub max_iterations: u32,
    /// Primary metric
    pub metric: String,
    /// Secondary metrics recorded when present
    pub extra_metrics: Vec<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            rate_start: InjectionRate::DEFAULT_STEP,
            rate_step: InjectionRate::DEFAULT_STEP,
            latency_ceiling: 100.0,
            max_iterations: 50,
            metric: AVERAGE_PACKET_LATENCY.to_string(),
            extra_metrics: Vec::new(),
        }
    }
}

impl SearchParams {
    /// Check the bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a non-positive or non-finite ceiling, a zero
    /// iteration bound, or an empty metric name.
    pub fn validate(&self) -> Result<()> {
        if !(self.latency_ceiling.is_finite() && self.latency_ceiling > 0.0) {
            return Err(Error::ConfigError(format!(
                "latency ceiling must be a positive number, got {}",
                self.latency_ceiling
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::ConfigError(
                "max iterations must be at least 1".to_string(),
            ));
        }
        if self.metric.trim().is_empty() {
            return Err(Error::ConfigError("metric name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// One measured sample, as printed while a sweep runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    cell: CellKey,
    rate: InjectionRate,
    latency: f64,
}

impl ProgressEvent {
    /// Create an event.
    #[must_use]
    pub const fn new(cell: CellKey, rate: InjectionRate, latency: f64) -> Self {
        Self {
            cell,
            rate,
            latency,
        }
    }

    /// Get the cell.
    #[must_use]
    pub const fn cell(&self) -> &CellKey {
        &self.cell
    }

    /// Get the sampled rate.
    #[must_use]
    pub const fn rate(&self) -> InjectionRate {
        self.rate
    }

    /// Get the measured latency.
    #[must_use]
    pub const fn latency(&self) -> f64 {
        self.latency
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cores={} pattern={} inj={} latency={:.6}",
            self.cell.mesh().cores,
            self.cell.pattern(),
            self.rate,
            self.latency
        )
    }
}

/// Sending half of the progress channel.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Result of sampling one rate.
enum Step {
    Measured(SimulationResult, f64),
    Failed(Option<SimulationResult>, FailureReason),
}

/// Drives the rate walk for single cells.
pub struct SaturationSearch<S, X> {
    translator: Arc<ConfigTranslator>,
    runner: SimulationRunner<S, X>,
    extractor: MetricExtractor,
    params: SearchParams,
    progress: Option<ProgressSender>,
}

impl<S, X> Clone for SaturationSearch<S, X> {
    fn clone(&self) -> Self {
        Self {
            translator: Arc::clone(&self.translator),
            runner: self.runner.clone(),
            extractor: self.extractor.clone(),
            params: self.params.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<S: ResultStore, X: Simulator> SaturationSearch<S, X> {
    /// Create a search.
    #[must_use]
    pub fn new(
        translator: ConfigTranslator,
        runner: SimulationRunner<S, X>,
        params: SearchParams,
    ) -> Self {
        Self {
            translator: Arc::new(translator),
            runner,
            extractor: MetricExtractor::default(),
            params,
            progress: None,
        }
    }

    /// Use a custom extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: MetricExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Publish every measured sample on `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Get the search parameters.
    #[must_use]
    pub const fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Search one cell.
    ///
    /// Never fails: every problem becomes the trace's terminal outcome.
    pub async fn search(&self, cell: CellKey) -> SearchTrace {
        let params = &self.params;
        let mut samples = Vec::new();
        let mut rate = params.rate_start;

        for _ in 0..params.max_iterations {
            let invocation = match self.translator.translate(&cell.at(rate)) {
                Ok(invocation) => invocation,
                Err(e) => {
                    warn!(%cell, error = %e, "cell cannot be simulated");
                    let reason = FailureReason::InvalidConfiguration {
                        message: e.to_string(),
                    };
                    return SearchTrace::new(cell, samples, SearchOutcome::Failed(reason));
                }
            };

            match self.sample(&invocation).await {
                Step::Measured(result, latency) => {
                    samples.push(result);
                    info!(
                        cores = cell.mesh().cores,
                        pattern = %cell.pattern(),
                        rate = %rate,
                        latency,
                        "sample measured"
                    );
                    if let Some(progress) = &self.progress {
                        // A closed channel only means nobody is watching
                        let _ = progress.send(ProgressEvent::new(cell, rate, latency));
                    }
                    if latency >= params.latency_ceiling {
                        info!(%cell, rate = %rate, latency, "cell saturated");
                        return SearchTrace::new(
                            cell,
                            samples,
                            SearchOutcome::Saturated { rate, latency },
                        );
                    }
                }
                Step::Failed(result, reason) => {
                    warn!(%cell, %reason, "search aborted");
                    samples.extend(result);
                    return SearchTrace::new(cell, samples, SearchOutcome::Failed(reason));
                }
            }

            match rate.checked_add(params.rate_step) {
                Some(next) => rate = next,
                None => break,
            }
        }

        let last_rate = samples.last().map(|s| s.point().injection_rate());
        info!(%cell, last_rate = ?last_rate.map(InjectionRate::formatted), "no saturation found");
        SearchTrace::new(cell, samples, SearchOutcome::NoSaturationFound { last_rate })
    }

    async fn sample(&self, invocation: &SimulatorInvocation) -> Step {
        let store = self.runner.store();
        let key = invocation.key();
        let rate = invocation.point().injection_rate();
        let metric = self.params.metric.as_str();

        let existing = match store.record(key).await {
            Ok(existing) => existing,
            Err(e) => return Step::Failed(None, store_failure(&e)),
        };

        let result = match existing {
            Some(record) if record.is_success() => {
                if let Some(latency) = record.metric(metric) {
                    debug!(%key, "reusing measured result");
                    return Step::Measured(record, latency);
                }
                debug!(%key, "reusing artifact, metric not yet extracted");
                record
            }
            _ => match self.runner.run(invocation).await {
                Ok(result) => result,
                Err(e) => return Step::Failed(None, store_failure(&e)),
            },
        };

        match result.status() {
            SimulationStatus::Failed => {
                let detail = result.diagnostic().unwrap_or("no diagnostic output").to_string();
                Step::Failed(Some(result), FailureReason::SimulationFailed { rate, detail })
            }
            SimulationStatus::Timeout => Step::Failed(Some(result), FailureReason::Timeout { rate }),
            SimulationStatus::Success => {
                let extracted = self
                    .extractor
                    .extract_all(store.as_ref(), key, metric, &self.params.extra_metrics)
                    .await;
                match extracted {
                    Ok(metrics) => {
                        let latency = metrics.get(metric).copied().unwrap_or(f64::NAN);
                        let result = result.with_metrics(metrics);
                        if let Err(e) = store.put_record(key, &result).await {
                            return Step::Failed(Some(result), store_failure(&e));
                        }
                        Step::Measured(result, latency)
                    }
                    Err(Error::Extraction(error)) => {
                        warn!(%key, %error, "metric extraction failed");
                        Step::Failed(Some(result), FailureReason::Extraction { rate, error })
                    }
                    Err(e) => Step::Failed(Some(result), store_failure(&e)),
                }
            }
        }
    }
}

fn store_failure(error: &Error) -> FailureReason {
    FailureReason::Store {
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{MeshSize, RoutingAlgorithm, TrafficPattern};

    #[test]
    fn test_default_params() {
        let params = SearchParams::default();
        assert_eq!(params.rate_start.formatted(), "0.02");
        assert_eq!(params.rate_step.formatted(), "0.02");
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_validation() {
        let zero_iterations = SearchParams {
            max_iterations: 0,
            ..SearchParams::default()
        };
        assert!(matches!(zero_iterations.validate(), Err(Error::ConfigError(_))));

        let nan_ceiling = SearchParams {
            latency_ceiling: f64::NAN,
            ..SearchParams::default()
        };
        assert!(nan_ceiling.validate().is_err());
    }

    #[test]
    fn test_progress_line_format() {
        let cell = CellKey::new(MeshSize::new(64, 8), TrafficPattern::Shuffle, 4, RoutingAlgorithm::Xy);
        let event = ProgressEvent::new(cell, InjectionRate::from_hundredths(10).unwrap(), 100.0);
        assert_eq!(
            event.to_string(),
            "cores=64 pattern=SHUFFLE inj=0.10 latency=100.000000"
        );
    }

    #[test]
    fn test_params_deserialize_rates_as_fractions() {
        let params: SearchParams =
            serde_json::from_str(r#"{"rate_start": 0.04, "latency_ceiling": 80.0}"#).unwrap();
        assert_eq!(params.rate_start.hundredths(), 4);
        assert_eq!(params.rate_step.hundredths(), 2);
        assert_eq!(params.max_iterations, 50);
    }
}
