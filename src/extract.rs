//! Metric extraction from simulator stats reports.
//!
//! A metric line looks like
//!
//! ```text
//! system.ruby.network.average_packet_latency   42.700000   # Average packet latency
//! ```
//!
//! The value is the first token after the key and its following whitespace.
//! Parsing never panics on truncated or non-UTF-8 artifacts: every problem
//! surfaces as an [`ExtractionError`].

use std::collections::BTreeMap;

use tracing::warn;

use crate::store::{ResultKey, ResultStore};
use crate::{ExtractionError, Result};

/// Metric used to detect saturation.
pub const AVERAGE_PACKET_LATENCY: &str = "average_packet_latency";

/// Stats namespace of the network model.
pub const NETWORK_STATS_PREFIX: &str = "system.ruby.network.";

/// Reads named metrics out of stats reports.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    prefix: String,
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self::new(NETWORK_STATS_PREFIX)
    }
}

impl MetricExtractor {
    /// Create an extractor for metrics under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Extract one metric from artifact text.
    ///
    /// # Errors
    ///
    /// - `MetricNotFound` if no line carries the key
    /// - `MetricAmbiguous` if matching lines disagree
    /// - `MetricMalformed` if the value is not a finite number
    pub fn extract_text(&self, artifact: &str, metric: &str) -> std::result::Result<f64, ExtractionError> {
        let key = format!("{}{metric}", self.prefix);
        let raws: Vec<&str> = artifact
            .lines()
            .filter_map(|line| value_after_key(line, &key))
            .collect();

        let Some(first) = raws.first() else {
            return Err(ExtractionError::MetricNotFound {
                metric: metric.to_string(),
            });
        };

        let mut value = None;
        for raw in &raws {
            let parsed = parse_value(raw).ok_or_else(|| ExtractionError::MetricMalformed {
                metric: metric.to_string(),
                raw: (*raw).to_string(),
            })?;
            match value {
                None => value = Some(parsed),
                Some(seen) if seen == parsed => {}
                Some(_) => {
                    return Err(ExtractionError::MetricAmbiguous {
                        metric: metric.to_string(),
                        values: raws.iter().map(|r| (*r).to_string()).collect(),
                    })
                }
            }
        }

        value.ok_or_else(|| ExtractionError::MetricMalformed {
            metric: metric.to_string(),
            raw: (*first).to_string(),
        })
    }

    /// Extract one metric from the artifact stored under `key`.
    ///
    /// # Errors
    ///
    /// `ArtifactMissing` if nothing is stored, any `extract_text` error, or a
    /// store read error.
    pub async fn extract<S: ResultStore>(&self, store: &S, key: &ResultKey, metric: &str) -> Result<f64> {
        let text = self.load(store, key).await?;
        Ok(self.extract_text(&text, metric)?)
    }

    /// Extract a primary metric (fatal if unreadable) and optional secondary
    /// metrics (logged and skipped if unreadable).
    ///
    /// # Errors
    ///
    /// Same as [`MetricExtractor::extract`], for the primary metric only.
    pub async fn extract_all<S: ResultStore>(
        &self,
        store: &S,
        key: &ResultKey,
        primary: &str,
        secondary: &[String],
    ) -> Result<BTreeMap<String, f64>> {
        let text = self.load(store, key).await?;
        let mut metrics = BTreeMap::new();
        metrics.insert(primary.to_string(), self.extract_text(&text, primary)?);
        for name in secondary {
            match self.extract_text(&text, name) {
                Ok(value) => {
                    metrics.insert(name.clone(), value);
                }
                Err(error) => warn!(%key, metric = %name, %error, "secondary metric unavailable"),
            }
        }
        Ok(metrics)
    }

    async fn load<S: ResultStore>(&self, store: &S, key: &ResultKey) -> Result<String> {
        let bytes = store
            .get(key)
            .await?
            .ok_or_else(|| ExtractionError::ArtifactMissing { key: key.to_string() })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Text following `key` on `line`, if `key` appears as a whole token.
fn value_after_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)?;
    let rest = &line[start + key.len()..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}

fn parse_value(raw: &str) -> Option<f64> {
    let token = raw.split_whitespace().next()?;
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> MetricExtractor {
        MetricExtractor::default()
    }

    #[test]
    fn test_extracts_value() {
        let text = "system.ruby.network.average_packet_latency   42.7\n";
        assert_eq!(extractor().extract_text(text, AVERAGE_PACKET_LATENCY), Ok(42.7));
    }

    #[test]
    fn test_ignores_trailing_comment() {
        let text = "system.ruby.network.average_packet_latency 17.250000 # Average packet latency (Cycle)\n";
        assert_eq!(extractor().extract_text(text, AVERAGE_PACKET_LATENCY), Ok(17.25));
    }

    #[test]
    fn test_prefix_match_is_not_a_match() {
        let text = "system.ruby.network.average_packet_latency_vnet0   9.0\n";
        assert!(matches!(
            extractor().extract_text(text, AVERAGE_PACKET_LATENCY),
            Err(ExtractionError::MetricNotFound { .. })
        ));
    }

    #[test]
    fn test_not_found() {
        let text = "system.ruby.network.average_flit_latency   12.0\n";
        assert_eq!(
            extractor().extract_text(text, AVERAGE_PACKET_LATENCY),
            Err(ExtractionError::MetricNotFound {
                metric: AVERAGE_PACKET_LATENCY.to_string()
            })
        );
    }

    #[test]
    fn test_malformed() {
        let text = "system.ruby.network.average_packet_latency   abc\n";
        assert!(matches!(
            extractor().extract_text(text, AVERAGE_PACKET_LATENCY),
            Err(ExtractionError::MetricMalformed { raw, .. }) if raw == "abc"
        ));
    }

    #[test]
    fn test_truncated_line_is_malformed() {
        let text = "sim_ticks 100\nsystem.ruby.network.average_packet_latency";
        assert!(matches!(
            extractor().extract_text(text, AVERAGE_PACKET_LATENCY),
            Err(ExtractionError::MetricMalformed { .. })
        ));
    }

    #[test]
    fn test_nan_is_malformed() {
        let text = "system.ruby.network.average_packet_latency   nan\n";
        assert!(matches!(
            extractor().extract_text(text, AVERAGE_PACKET_LATENCY),
            Err(ExtractionError::MetricMalformed { .. })
        ));
    }

    #[test]
    fn test_repeated_equal_values_are_accepted() {
        let text = "system.ruby.network.average_packet_latency 5.5\n\
                    system.ruby.network.average_packet_latency 5.50\n";
        assert_eq!(extractor().extract_text(text, AVERAGE_PACKET_LATENCY), Ok(5.5));
    }

    #[test]
    fn test_differing_values_are_ambiguous() {
        let text = "system.ruby.network.average_packet_latency 5.5\n\
                    system.ruby.network.average_packet_latency 6.5\n";
        assert!(matches!(
            extractor().extract_text(text, AVERAGE_PACKET_LATENCY),
            Err(ExtractionError::MetricAmbiguous { values, .. }) if values.len() == 2
        ));
    }
}
