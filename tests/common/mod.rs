//! Shared fixtures: an in-process simulator stub and search builders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use noc_saturation::experiment::{
    CellKey, ExperimentPoint, MeshSize, RoutingAlgorithm, SwapPolicy, TrafficPattern,
};
use noc_saturation::runner::{RunOutcome, SimulationRunner, Simulator};
use noc_saturation::search::{SaturationSearch, SearchParams};
use noc_saturation::store::{MemoryResultStore, ResultStore};
use noc_saturation::translate::{ConfigTranslator, SimulatorInvocation, SimulatorSettings};

/// What the stub does for one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    /// Exit 0 and report this latency
    Latency(f64),
    /// Exit non-zero
    Fail,
    /// Exit 0 with an unparseable metric
    Garbage,
    /// Never exit
    Hang,
}

type ReplyFn = dyn Fn(&ExperimentPoint) -> Reply + Send + Sync;

/// Simulator stub writing artifacts straight into a memory store.
pub struct StubSimulator {
    store: Arc<MemoryResultStore>,
    reply: Box<ReplyFn>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    points: Mutex<Vec<ExperimentPoint>>,
}

impl StubSimulator {
    pub fn new(
        store: Arc<MemoryResultStore>,
        reply: impl Fn(&ExperimentPoint) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            reply: Box::new(reply),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            points: Mutex::new(Vec::new()),
        }
    }

    /// Latency = rate × 1000, computed exactly from hundredths.
    pub fn linear(store: Arc<MemoryResultStore>) -> Self {
        Self::new(store, |p| Reply::Latency(linear_latency(p)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn points(&self) -> Vec<ExperimentPoint> {
        self.points.lock().unwrap().clone()
    }
}

pub fn linear_latency(point: &ExperimentPoint) -> f64 {
    f64::from(point.injection_rate().hundredths()) * 10.0
}

impl Simulator for StubSimulator {
    async fn simulate(&self, invocation: &SimulatorInvocation) -> RunOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.points.lock().unwrap().push(*invocation.point());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::task::yield_now().await;
        let outcome = match (self.reply)(invocation.point()) {
            Reply::Latency(latency) => {
                let text = format!(
                    "sim_ticks 100000\nsystem.ruby.network.average_packet_latency {latency}   # Average packet latency\n"
                );
                self.store.put(invocation.key(), text.into_bytes()).await.unwrap();
                RunOutcome::success()
            }
            Reply::Fail => RunOutcome::failed("simulated crash"),
            Reply::Garbage => {
                let text = b"system.ruby.network.average_packet_latency abc\n".to_vec();
                self.store.put(invocation.key(), text).await.unwrap();
                RunOutcome::success()
            }
            Reply::Hang => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

pub fn cell(pattern: TrafficPattern) -> CellKey {
    CellKey::new(MeshSize::new(64, 8), pattern, 4, RoutingAlgorithm::AdaptRand)
        .with_swap(SwapPolicy::reference())
}

pub fn search(
    store: &Arc<MemoryResultStore>,
    simulator: &Arc<StubSimulator>,
    params: SearchParams,
) -> SaturationSearch<MemoryResultStore, StubSimulator> {
    let translator = ConfigTranslator::new(SimulatorSettings::default(), store.root());
    let runner = SimulationRunner::new(Arc::clone(store), Arc::clone(simulator));
    SaturationSearch::new(translator, runner, params)
}
