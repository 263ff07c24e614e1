//! Canonical result keys.
//!
//! The key is also the simulator's output directory relative to the results
//! root, so downstream tooling can rebuild it from the parameters alone:
//!
//! ```text
//! <cores>/<ROUTING>[+<swap-tag>]/<PATTERN>/vc-<V>/inj-<rate:2dp>
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::experiment::ExperimentPoint;

/// Relative, `/`-separated location of one experiment point's results.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultKey(String);

impl ResultKey {
    /// Derive the key for a point. Pure and deterministic.
    #[must_use]
    pub fn for_point(point: &ExperimentPoint) -> Self {
        let routing = match point.swap_policy().tag() {
            Some(tag) => format!("{}+{tag}", point.routing_algorithm().name()),
            None => point.routing_algorithm().name().to_string(),
        };
        Self(format!(
            "{}/{}/{}/vc-{}/inj-{}",
            point.network_size(),
            routing,
            point.traffic_pattern().name(),
            point.vc_count(),
            point.injection_rate().formatted(),
        ))
    }

    /// Get the key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the key below a results root.
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{
        CellKey, InjectionRate, MeshSize, RoutingAlgorithm, SwapPolicy, TrafficPattern,
    };

    #[test]
    fn test_key_layout() {
        let point = CellKey::new(
            MeshSize::new(64, 8),
            TrafficPattern::BitRotation,
            4,
            RoutingAlgorithm::AdaptRand,
        )
        .at(InjectionRate::from_hundredths(2).unwrap());

        assert_eq!(
            ResultKey::for_point(&point).as_str(),
            "64/ADAPT_RAND/BIT_ROTATION/vc-4/inj-0.02"
        );
    }

    #[test]
    fn test_key_carries_swap_tag() {
        let point = CellKey::new(
            MeshSize::new(256, 16),
            TrafficPattern::Transpose,
            2,
            RoutingAlgorithm::WestFirst,
        )
        .with_swap(SwapPolicy::reference())
        .at(InjectionRate::from_hundredths(14).unwrap());

        assert_eq!(
            ResultKey::for_point(&point).as_str(),
            "256/WestFirst+swap-w1-l1-o0/TRANSPOSE/vc-2/inj-0.14"
        );
    }

    #[test]
    fn test_key_under_root() {
        let point = CellKey::new(MeshSize::new(16, 4), TrafficPattern::Shuffle, 1, RoutingAlgorithm::Xy)
            .at(InjectionRate::MAX);
        let path = ResultKey::for_point(&point).under(Path::new("/tmp/results"));
        assert_eq!(path, PathBuf::from("/tmp/results/16/XY/SHUFFLE/vc-1/inj-1.00"));
    }
}
