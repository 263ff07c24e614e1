//! Extraction-only pass over existing results.
//!
//! Re-reads artifacts produced by an earlier sweep, walking each cell's rates
//! the same way a search does but with a higher ceiling, and never invokes the
//! simulator. A missing artifact (or one whose record says the run failed)
//! ends the cell quietly: the remaining rates are absent, not failed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::experiment::{CellKey, InjectionRate};
use crate::extract::MetricExtractor;
use crate::search::{ProgressEvent, ProgressSender, SearchParams};
use crate::store::ResultStore;
use crate::{Error, ExtractionError};

/// Default ceiling of the extraction-only pass.
pub const DEFAULT_HARVEST_CEILING: f64 = 200.0;

/// How a cell's harvest ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "end", rename_all = "snake_case")]
pub enum HarvestEnd {
    /// Latency reached the harvest ceiling at `rate`.
    Saturated {
        /// First rate at or above the ceiling
        rate: InjectionRate,
        /// Latency measured at `rate`
        latency: f64,
    },
    /// No usable result exists at `rate` or beyond.
    Absent {
        /// First rate without a usable result
        rate: InjectionRate,
    },
    /// An artifact exists at `rate` but its metric cannot be read.
    Unreadable {
        /// Rate of the unreadable artifact
        rate: InjectionRate,
        /// Extraction failure
        error: ExtractionError,
    },
    /// The result store could not be read.
    Store {
        /// Store error message
        message: String,
    },
    /// The iteration or rate bound ran out below the ceiling.
    Exhausted {
        /// Highest rate read, if any
        last_rate: Option<InjectionRate>,
    },
}

/// Measurements re-read for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestTrace {
    cell: CellKey,
    samples: Vec<(InjectionRate, f64)>,
    end: HarvestEnd,
}

impl HarvestTrace {
    /// Get the cell.
    #[must_use]
    pub const fn cell(&self) -> &CellKey {
        &self.cell
    }

    /// Get the `(rate, latency)` samples, in increasing rate order.
    #[must_use]
    pub fn samples(&self) -> &[(InjectionRate, f64)] {
        &self.samples
    }

    /// Get the end state.
    #[must_use]
    pub const fn end(&self) -> &HarvestEnd {
        &self.end
    }

    /// Whether an artifact could not be read.
    #[must_use]
    pub const fn is_unreadable(&self) -> bool {
        matches!(self.end, HarvestEnd::Unreadable { .. } | HarvestEnd::Store { .. })
    }
}

/// Reads results for cells without simulating.
pub struct HarvestPass<S> {
    store: Arc<S>,
    extractor: MetricExtractor,
    params: SearchParams,
    ceiling: f64,
    progress: Option<ProgressSender>,
}

impl<S: ResultStore> HarvestPass<S> {
    /// Create a pass walking rates as `params` does, stopping at `ceiling`.
    #[must_use]
    pub fn new(store: Arc<S>, params: SearchParams, ceiling: f64) -> Self {
        Self {
            store,
            extractor: MetricExtractor::default(),
            params,
            ceiling,
            progress: None,
        }
    }

    /// Publish every sample read on `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Harvest every cell, in order.
    pub async fn run(&self, cells: impl IntoIterator<Item = CellKey>) -> Vec<HarvestTrace> {
        let mut traces = Vec::new();
        for cell in cells {
            traces.push(self.harvest(cell).await);
        }
        traces
    }

    /// Harvest one cell.
    pub async fn harvest(&self, cell: CellKey) -> HarvestTrace {
        let bound = usize::try_from(self.params.max_iterations).unwrap_or(usize::MAX);
        let mut samples = Vec::new();
        let mut rate = self.params.rate_start;

        let end = loop {
            if samples.len() >= bound {
                break HarvestEnd::Exhausted {
                    last_rate: samples.last().map(|&(r, _)| r),
                };
            }

            match self.read(cell, rate).await {
                Ok(Some(latency)) => {
                    samples.push((rate, latency));
                    info!(cores = cell.mesh().cores, pattern = %cell.pattern(), rate = %rate, latency, "sample read");
                    if let Some(progress) = &self.progress {
                        let _ = progress.send(ProgressEvent::new(cell, rate, latency));
                    }
                    if latency >= self.ceiling {
                        break HarvestEnd::Saturated { rate, latency };
                    }
                }
                Ok(None) => break HarvestEnd::Absent { rate },
                Err(Error::Extraction(error)) => {
                    warn!(%cell, rate = %rate, %error, "artifact unreadable");
                    break HarvestEnd::Unreadable { rate, error };
                }
                Err(e) => {
                    break HarvestEnd::Store {
                        message: e.to_string(),
                    }
                }
            }

            match rate.checked_add(self.params.rate_step) {
                Some(next) => rate = next,
                None => {
                    break HarvestEnd::Exhausted {
                        last_rate: Some(rate),
                    }
                }
            }
        };

        HarvestTrace { cell, samples, end }
    }

    /// Latency at one rate, or `None` if no usable result exists.
    async fn read(&self, cell: CellKey, rate: InjectionRate) -> crate::Result<Option<f64>> {
        let key = self.store.key(&cell.at(rate));
        if let Some(record) = self.store.record(&key).await? {
            if !record.is_success() {
                debug!(%key, status = ?record.status(), "recorded run did not succeed");
                return Ok(None);
            }
        }
        if !self.store.exists(&key).await? {
            return Ok(None);
        }
        self.extractor
            .extract(self.store.as_ref(), &key, &self.params.metric)
            .await
            .map(Some)
    }
}
