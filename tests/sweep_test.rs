//! Orchestrator tests: grid enumeration, partial failure and cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{linear_latency, search, Reply, StubSimulator};
use noc_saturation::experiment::{
    MeshSize, RoutingAlgorithm, SearchOutcome, SwapPolicy, TrafficPattern,
};
use noc_saturation::search::SearchParams;
use noc_saturation::store::MemoryResultStore;
use noc_saturation::sweep::{SweepAxes, SweepOrchestrator};

fn axes(patterns: Vec<TrafficPattern>) -> SweepAxes {
    SweepAxes {
        meshes: vec![MeshSize::new(64, 8)],
        patterns,
        vcs: vec![4],
        routing: vec![RoutingAlgorithm::AdaptRand],
        swap_policies: vec![SwapPolicy::reference()],
    }
}

#[tokio::test]
async fn test_every_cell_gets_a_trace_in_grid_order() {
    let store = Arc::new(MemoryResultStore::new());
    let simulator = Arc::new(StubSimulator::linear(Arc::clone(&store)));
    let orchestrator = SweepOrchestrator::new(search(&store, &simulator, SearchParams::default()), 4);
    let axes = SweepAxes {
        meshes: vec![MeshSize::new(64, 8), MeshSize::new(256, 16)],
        ..axes(vec![TrafficPattern::BitRotation, TrafficPattern::Shuffle, TrafficPattern::Transpose])
    };

    let report = orchestrator.run(&axes).await;

    assert_eq!(report.traces().len(), 6);
    let cells: Vec<_> = report.traces().iter().map(|t| *t.cell()).collect();
    assert_eq!(cells, axes.cells());
    assert_eq!(report.saturated(), 6);
    assert!(!report.has_failures());
    assert!(!report.was_interrupted());
    assert_eq!(simulator.calls(), 30);
}

#[tokio::test]
async fn test_repeated_pattern_is_simulated_once() {
    let store = Arc::new(MemoryResultStore::new());
    let simulator = Arc::new(StubSimulator::linear(Arc::clone(&store)));
    let orchestrator = SweepOrchestrator::new(search(&store, &simulator, SearchParams::default()), 4);
    let axes = axes(vec![TrafficPattern::Shuffle, TrafficPattern::Shuffle]);
    assert!(axes.validate().is_err());

    let report = orchestrator.run(&axes).await;

    assert_eq!(report.traces().len(), 1);
    assert_eq!(simulator.calls(), 5);
    let mut points = simulator.points();
    points.sort();
    points.dedup();
    assert_eq!(points.len(), 5);
}

#[tokio::test]
async fn test_failed_cell_does_not_stop_others() {
    let store = Arc::new(MemoryResultStore::new());
    let simulator = Arc::new(StubSimulator::new(Arc::clone(&store), |p| {
        if p.traffic_pattern() == TrafficPattern::Transpose {
            Reply::Fail
        } else {
            Reply::Latency(linear_latency(p))
        }
    }));
    let orchestrator = SweepOrchestrator::new(search(&store, &simulator, SearchParams::default()), 2);
    let axes = axes(vec![TrafficPattern::Transpose, TrafficPattern::Shuffle, TrafficPattern::Tornado]);

    let report = orchestrator.run(&axes).await;

    assert!(report.has_failures());
    assert_eq!(report.failed(), 1);
    assert_eq!(report.saturated(), 2);
    assert!(report.traces()[0].outcome().is_failure());
    assert!(matches!(
        report.traces()[1].outcome(),
        SearchOutcome::Saturated { .. }
    ));
}

#[tokio::test]
async fn test_no_saturation_is_not_a_failure() {
    let store = Arc::new(MemoryResultStore::new());
    let simulator = Arc::new(StubSimulator::new(Arc::clone(&store), |_| Reply::Latency(5.0)));
    let params = SearchParams {
        max_iterations: 4,
        ..SearchParams::default()
    };
    let orchestrator = SweepOrchestrator::new(search(&store, &simulator, params), 2);

    let report = orchestrator.run(&axes(vec![TrafficPattern::Shuffle])).await;

    assert!(!report.has_failures());
    assert!(matches!(
        report.traces()[0].outcome(),
        SearchOutcome::NoSaturationFound { .. }
    ));
}

#[tokio::test]
async fn test_workers_bound_concurrent_simulations() {
    let store = Arc::new(MemoryResultStore::new());
    let simulator = Arc::new(StubSimulator::linear(Arc::clone(&store)));
    let orchestrator = SweepOrchestrator::new(search(&store, &simulator, SearchParams::default()), 2);
    let axes = axes(TrafficPattern::ALL.to_vec());

    let report = orchestrator.run(&axes).await;

    assert_eq!(report.traces().len(), 8);
    assert!(simulator.max_in_flight() <= 2);
}

#[tokio::test]
async fn test_shutdown_cancels_outstanding_cells() {
    let store = Arc::new(MemoryResultStore::new());
    let simulator = Arc::new(StubSimulator::new(Arc::clone(&store), |_| Reply::Hang));
    let orchestrator = SweepOrchestrator::new(search(&store, &simulator, SearchParams::default()), 2);
    let axes = axes(vec![TrafficPattern::Shuffle, TrafficPattern::Transpose, TrafficPattern::Tornado]);

    let report = orchestrator
        .run_until(&axes, tokio::time::sleep(Duration::from_millis(50)))
        .await;

    assert!(report.was_interrupted());
    assert_eq!(report.cancelled(), 3);
    assert!(!report.has_failures());
    assert_eq!(report.traces().len(), 3);
    assert!(report.traces().iter().all(|t| t.samples().is_empty()));
}

#[tokio::test]
async fn test_report_serializes_outcomes() {
    let store = Arc::new(MemoryResultStore::new());
    let simulator = Arc::new(StubSimulator::linear(Arc::clone(&store)));
    let orchestrator = SweepOrchestrator::new(search(&store, &simulator, SearchParams::default()), 1);

    let report = orchestrator.run(&axes(vec![TrafficPattern::Shuffle])).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["traces"][0]["outcome"]["outcome"], "saturated");
    assert_eq!(json["traces"][0]["outcome"]["rate"], 0.1);
}
