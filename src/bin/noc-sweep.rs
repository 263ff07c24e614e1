//! `noc-sweep`: run a saturation sweep, or re-read the results of one.
//!
//! Progress lines go to stdout, logs to stderr (`RUST_LOG` controls the
//! level). Exit codes: 0 ok, 1 some cell failed, 2 configuration error,
//! 130 interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use noc_saturation::config::SweepConfig;
use noc_saturation::experiment::{
    InjectionRate, MeshSize, NetworkMode, RoutingAlgorithm, SwapPolicy, TrafficPattern,
    WhenToSwap, WhichToSwap,
};
use noc_saturation::harvest::HarvestPass;
use noc_saturation::runner::{ProcessSimulator, SimulationRunner};
use noc_saturation::search::{ProgressEvent, SaturationSearch};
use noc_saturation::store::FsResultStore;
use noc_saturation::sweep::SweepOrchestrator;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_FAILED_CELLS: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "noc-sweep", version, about = "Find NoC saturation points by sweeping injection rate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate every cell of the grid until its latency saturates
    Run {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Remove the results root before starting
        #[arg(long)]
        fresh: bool,
    },
    /// Re-read existing results without simulating
    Harvest {
        #[command(flatten)]
        sweep: SweepArgs,
    },
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// TOML configuration file
    #[arg(long, env = "NOC_SWEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding one sub-directory per experiment point
    #[arg(long)]
    results_root: Option<PathBuf>,

    /// Simulator binary
    #[arg(long)]
    simulator: Option<PathBuf>,

    /// Simulator configuration script
    #[arg(long)]
    script: Option<PathBuf>,

    /// Working directory of the simulator process
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Network model (garnet2.0 or simple)
    #[arg(long)]
    network: Option<NetworkMode>,

    /// Simulated cycles per run
    #[arg(long)]
    sim_cycles: Option<u64>,

    /// Wall-clock budget per run, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Mesh shapes as cores:rows (repeatable, comma separated)
    #[arg(long, value_delimiter = ',')]
    mesh: Vec<MeshSize>,

    /// Traffic patterns
    #[arg(long, value_delimiter = ',')]
    pattern: Vec<TrafficPattern>,

    /// Virtual channels per virtual network
    #[arg(long, value_delimiter = ',')]
    vcs: Vec<u32>,

    /// Routing algorithms, by name or code
    #[arg(long, value_delimiter = ',')]
    routing: Vec<RoutingAlgorithm>,

    /// First injection rate
    #[arg(long)]
    rate_start: Option<InjectionRate>,

    /// Injection rate increment
    #[arg(long)]
    rate_step: Option<InjectionRate>,

    /// Latency at which a cell counts as saturated
    #[arg(long)]
    latency_ceiling: Option<f64>,

    /// Latency at which `harvest` stops reading a cell
    #[arg(long)]
    harvest_ceiling: Option<f64>,

    /// Maximum samples per cell
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Cells simulated at once (0 = available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Disable router port swapping
    #[arg(long, conflicts_with_all = ["when_to_swap", "which_to_swap", "occupancy_threshold", "use_is_swap_bit"])]
    no_swap: bool,

    /// Port-swap trigger (TDM, TDM2 ... TDM32, or code 1-6)
    #[arg(long)]
    when_to_swap: Option<WhenToSwap>,

    /// Ports taking part in a swap (DISABLE_LOCAL/1 or ENABLE_LOCAL/2)
    #[arg(long)]
    which_to_swap: Option<WhichToSwap>,

    /// Swap when VC occupancy exceeds this percentage
    #[arg(long)]
    occupancy_threshold: Option<u8>,

    /// Use the per-router is_swap bit
    #[arg(long)]
    use_is_swap_bit: bool,
}

impl SweepArgs {
    /// Load the layered configuration and apply flag overrides on top.
    fn load(&self) -> noc_saturation::Result<SweepConfig> {
        let mut config = SweepConfig::load(self.config.as_deref())?;

        if let Some(root) = &self.results_root {
            config.results_root = root.clone();
        }
        let simulator = &mut config.simulator;
        if let Some(binary) = &self.simulator {
            simulator.binary = binary.clone();
        }
        if let Some(script) = &self.script {
            simulator.script = script.clone();
        }
        if let Some(dir) = &self.working_dir {
            simulator.working_dir = Some(dir.clone());
        }
        if let Some(network) = self.network {
            simulator.network = network;
        }
        if let Some(cycles) = self.sim_cycles {
            simulator.sim_cycles = cycles;
        }
        if let Some(secs) = self.timeout_secs {
            simulator.timeout_secs = secs;
        }

        let axes = &mut config.axes;
        if !self.mesh.is_empty() {
            axes.meshes.clone_from(&self.mesh);
        }
        if !self.pattern.is_empty() {
            axes.patterns.clone_from(&self.pattern);
        }
        if !self.vcs.is_empty() {
            axes.vcs.clone_from(&self.vcs);
        }
        if !self.routing.is_empty() {
            axes.routing.clone_from(&self.routing);
        }
        if let Some(policy) = self.swap_policy() {
            axes.swap_policies = vec![policy];
        }

        let search = &mut config.search;
        if let Some(rate) = self.rate_start {
            search.rate_start = rate;
        }
        if let Some(rate) = self.rate_step {
            search.rate_step = rate;
        }
        if let Some(ceiling) = self.latency_ceiling {
            search.latency_ceiling = ceiling;
        }
        if let Some(max) = self.max_iterations {
            search.max_iterations = max;
        }
        if let Some(ceiling) = self.harvest_ceiling {
            config.harvest_ceiling = ceiling;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }

        config.validate()?;
        Ok(config)
    }

    fn swap_policy(&self) -> Option<SwapPolicy> {
        if self.no_swap {
            return Some(SwapPolicy::disabled());
        }
        let configured = self.when_to_swap.is_some()
            || self.which_to_swap.is_some()
            || self.occupancy_threshold.is_some()
            || self.use_is_swap_bit;
        configured.then(|| {
            SwapPolicy::enabled(
                self.when_to_swap.unwrap_or(WhenToSwap::Tdm),
                self.which_to_swap.unwrap_or(WhichToSwap::DisableLocal),
            )
            .with_occupancy_threshold(self.occupancy_threshold.unwrap_or(0))
            .with_is_swap_bit(self.use_is_swap_bit)
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (sweep, fresh) = match &cli.command {
        Command::Run { sweep, fresh } => (sweep, *fresh),
        Command::Harvest { sweep } => (sweep, false),
    };

    let mut config = match sweep.load() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    // The simulator may run in another working directory
    if config.results_root.is_relative() {
        config.results_root = std::env::current_dir()?.join(&config.results_root);
    }

    match cli.command {
        Command::Run { .. } => run(config, fresh).await,
        Command::Harvest { .. } => harvest(config).await,
    }
}

async fn run(config: SweepConfig, fresh: bool) -> anyhow::Result<ExitCode> {
    let store = Arc::new(FsResultStore::new(&config.results_root));
    if fresh {
        info!(root = %config.results_root.display(), "removing previous results");
        store.wipe().await?;
    }

    let (progress, printer) = progress_printer();
    let simulator = Arc::new(ProcessSimulator::new(config.timeout()));
    let runner = SimulationRunner::new(Arc::clone(&store), simulator);
    let search =
        SaturationSearch::new(config.translator(), runner, config.search.clone()).with_progress(progress);
    let orchestrator = SweepOrchestrator::new(search, config.resolved_workers());

    let report = orchestrator.run_until(&config.axes, shutdown_signal()).await;
    drop(orchestrator);
    printer.await?;

    for trace in report.traces() {
        println!("{}: {}", trace.cell(), trace.outcome());
    }
    let path = config.results_root.join("report.json");
    write_json(&path, &report).await?;
    info!(path = %path.display(), "report written");

    Ok(if report.was_interrupted() {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if report.has_failures() {
        ExitCode::from(EXIT_FAILED_CELLS)
    } else {
        ExitCode::SUCCESS
    })
}

async fn harvest(config: SweepConfig) -> anyhow::Result<ExitCode> {
    let store = Arc::new(FsResultStore::new(&config.results_root));
    let (progress, printer) = progress_printer();
    let pass = HarvestPass::new(store, config.search.clone(), config.harvest_ceiling)
        .with_progress(progress);

    let traces = tokio::select! {
        traces = pass.run(config.axes.cells()) => traces,
        () = shutdown_signal() => return Ok(ExitCode::from(EXIT_INTERRUPTED)),
    };
    drop(pass);
    printer.await?;

    let path = config.results_root.join("harvest.json");
    write_json(&path, &traces).await?;
    info!(path = %path.display(), cells = traces.len(), "harvest written");

    Ok(if traces.iter().any(|t| t.is_unreadable()) {
        ExitCode::from(EXIT_FAILED_CELLS)
    } else {
        ExitCode::SUCCESS
    })
}

/// Progress channel whose receiver prints one line per sample to stdout.
fn progress_printer() -> (
    mpsc::UnboundedSender<ProgressEvent>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{event}");
        }
    });
    (tx, printer)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler: never request shutdown
        std::future::pending::<()>().await;
    }
}

async fn write_json<T: serde::Serialize>(path: &std::path::Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}
