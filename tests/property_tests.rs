//! Property-based tests for noc-saturation
//!
//! - Test key and translation invariants over the whole option space
//! - Test search trace invariants against random latency curves
//! - Run with ProptestConfig::with_cases(100)

mod common;

use std::sync::Arc;

use common::{cell, search, Reply, StubSimulator};
use noc_saturation::experiment::{
    CellKey, ExperimentPoint, InjectionRate, MeshSize, RoutingAlgorithm, SearchOutcome, SwapPolicy,
    TrafficPattern, WhenToSwap, WhichToSwap,
};
use noc_saturation::extract::{MetricExtractor, AVERAGE_PACKET_LATENCY};
use noc_saturation::search::SearchParams;
use noc_saturation::store::{MemoryResultStore, ResultKey};
use noc_saturation::translate::{ConfigTranslator, SimulatorSettings};
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

fn arb_rate() -> impl Strategy<Value = InjectionRate> {
    (1u16..=100).prop_map(|h| InjectionRate::from_hundredths(h).unwrap())
}

fn arb_swap() -> impl Strategy<Value = SwapPolicy> {
    prop_oneof![
        Just(SwapPolicy::disabled()),
        (
            proptest::sample::select(WhenToSwap::ALL.to_vec()),
            prop_oneof![Just(WhichToSwap::DisableLocal), Just(WhichToSwap::EnableLocal)],
            0u8..=100,
            any::<bool>(),
        )
            .prop_map(|(when, which, occupancy, isb)| {
                SwapPolicy::enabled(when, which)
                    .with_occupancy_threshold(occupancy)
                    .with_is_swap_bit(isb)
            }),
    ]
}

/// Valid points over meshes with distinct core counts.
fn arb_point() -> impl Strategy<Value = ExperimentPoint> {
    (
        proptest::sample::select(vec![
            MeshSize::new(16, 4),
            MeshSize::new(64, 8),
            MeshSize::new(256, 16),
        ]),
        proptest::sample::select(TrafficPattern::ALL.to_vec()),
        1u32..=8,
        proptest::sample::select(RoutingAlgorithm::ALL.to_vec()),
        arb_swap(),
        arb_rate(),
    )
        .prop_map(|(mesh, pattern, vcs, routing, swap, rate)| {
            CellKey::new(mesh, pattern, vcs, routing)
                .with_swap(swap)
                .at(rate)
        })
}

// ============================================================================
// Key and Translation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: distinct points never share a result location
    #[test]
    fn prop_key_is_injective(a in arb_point(), b in arb_point()) {
        let same_key = ResultKey::for_point(&a) == ResultKey::for_point(&b);
        prop_assert_eq!(same_key, a == b);
    }

    /// Property: translation is deterministic and writes to the point's key
    #[test]
    fn prop_translation_is_pure(point in arb_point()) {
        let translator = ConfigTranslator::new(SimulatorSettings::default(), "/results");
        let first = translator.translate(&point).unwrap();
        let second = translator.translate(&point).unwrap();

        prop_assert_eq!(first.args(), second.args());
        prop_assert_eq!(first.key(), &ResultKey::for_point(&point));
        prop_assert_eq!(
            first.output_dir().to_path_buf(),
            ResultKey::for_point(&point).under(std::path::Path::new("/results"))
        );
    }

    /// Property: the rate on the command line and in the key is the same text
    #[test]
    fn prop_rate_text_agrees(point in arb_point()) {
        let translator = ConfigTranslator::new(SimulatorSettings::default(), "results");
        let invocation = translator.translate(&point).unwrap();
        let text = point.injection_rate().formatted();

        let flag = format!("--injectionrate={text}");
        prop_assert!(invocation.args().iter().any(|a| a.to_string_lossy() == flag));
        let suffix = format!("inj-{text}");
        prop_assert!(invocation.key().as_str().ends_with(&suffix));
    }
}

// ============================================================================
// Extraction Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: arbitrary artifact bytes produce a value or an error, never a panic
    #[test]
    fn prop_extraction_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let text = String::from_utf8_lossy(&bytes);
        let _ = MetricExtractor::default().extract_text(&text, AVERAGE_PACKET_LATENCY);
    }

    /// Property: a finite value printed into a stats line is read back exactly
    #[test]
    fn prop_printed_latency_is_read_back(latency in 0.0f64..1.0e6, padding in 1usize..40) {
        let text = format!(
            "sim_ticks 1\nsystem.ruby.network.average_packet_latency{}{latency}   # cycles\n",
            " ".repeat(padding)
        );
        let read = MetricExtractor::default().extract_text(&text, AVERAGE_PACKET_LATENCY);
        prop_assert_eq!(read, Ok(latency));
    }
}

// ============================================================================
// Search Trace Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: sampled rates climb by exactly one step and the search stops
    /// at the first latency at or above the ceiling
    #[test]
    fn prop_trace_stops_at_first_crossing(curve in proptest::collection::vec(0.0f64..150.0, 100)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let store = Arc::new(MemoryResultStore::new());
        let simulator = Arc::new(StubSimulator::new(Arc::clone(&store), move |p| {
            Reply::Latency(curve[usize::from(p.injection_rate().hundredths()) - 1])
        }));
        let params = SearchParams::default();
        let ceiling = params.latency_ceiling;

        let trace = runtime.block_on(search(&store, &simulator, params).search(cell(TrafficPattern::Shuffle)));

        let rates = trace.rates();
        prop_assert!(!rates.is_empty());
        prop_assert_eq!(rates[0].hundredths(), 2);
        for pair in rates.windows(2) {
            prop_assert_eq!(pair[1].hundredths(), pair[0].hundredths() + 2);
        }

        let latencies: Vec<f64> = trace
            .samples()
            .iter()
            .map(|s| s.metric(AVERAGE_PACKET_LATENCY).unwrap())
            .collect();
        let (last, before) = latencies.split_last().unwrap();
        prop_assert!(before.iter().all(|l| *l < ceiling));
        match trace.outcome() {
            SearchOutcome::Saturated { rate, latency } => {
                prop_assert!(*last >= ceiling);
                prop_assert_eq!(*latency, *last);
                prop_assert_eq!(rate, rates.last().unwrap());
            }
            SearchOutcome::NoSaturationFound { .. } => prop_assert!(*last < ceiling),
            other => prop_assert!(false, "unexpected outcome {other}"),
        }
        prop_assert_eq!(simulator.calls(), rates.len());
    }
}
