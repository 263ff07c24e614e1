//! Experiment point → simulator command line.
//!
//! The translator is a pure function of the point and the fixed simulator
//! settings: the same input always yields a byte-identical invocation. It is
//! the only place that knows the simulator's flag spelling and option codes.
//!
//! ```text
//! <binary> -d <outdir> <script> --network=garnet2.0 --num-cpus=64 --num-dirs=64
//!          --topology=Mesh_XY --mesh-rows=8 [--interswap=1 --whenToSwap=1 ...]
//!          --sim-cycles=100000 --injectionrate=0.02 --vcs-per-vnet=4 --inj-vnet=0
//!          --synthetic=shuffle --routing-algorithm=3
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::experiment::{ExperimentPoint, NetworkMode};
use crate::store::ResultKey;
use crate::{Error, Result};

/// Simulator settings shared by every invocation of a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Simulator binary
    pub binary: PathBuf,
    /// Configuration script passed as the first positional argument
    pub script: PathBuf,
    /// Working directory of the child process (the simulator tree)
    pub working_dir: Option<PathBuf>,
    /// Network model
    pub network: NetworkMode,
    /// Topology name
    pub topology: String,
    /// Simulated cycles per run
    pub sim_cycles: u64,
    /// Virtual network packets are injected into
    pub inj_vnet: u32,
    /// Wall-clock budget per run, in seconds
    pub timeout_secs: u64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("build/Garnet_standalone/gem5.opt"),
            script: PathBuf::from("configs/example/garnet_synth_traffic.py"),
            working_dir: None,
            network: NetworkMode::Garnet,
            topology: "Mesh_XY".to_string(),
            sim_cycles: 100_000,
            inj_vnet: 0,
            timeout_secs: 3600,
        }
    }
}

/// A concrete simulator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorInvocation {
    point: ExperimentPoint,
    key: ResultKey,
    program: PathBuf,
    args: Vec<OsString>,
    output_dir: PathBuf,
    working_dir: Option<PathBuf>,
}

impl SimulatorInvocation {
    /// Create an invocation by hand, for simulators that do not take the
    /// translator's flag set. The key is derived from `point`.
    #[must_use]
    pub fn new(
        point: ExperimentPoint,
        program: impl Into<PathBuf>,
        args: Vec<OsString>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            point,
            key: ResultKey::for_point(&point),
            program: program.into(),
            args,
            output_dir: output_dir.into(),
            working_dir: None,
        }
    }

    /// Run the child process in `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Get the experiment point.
    #[must_use]
    pub const fn point(&self) -> &ExperimentPoint {
        &self.point
    }

    /// Get the result key.
    #[must_use]
    pub const fn key(&self) -> &ResultKey {
        &self.key
    }

    /// Get the program.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Get the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Get the working directory of the child process.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Shell-like rendering for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Translates experiment points into simulator invocations.
#[derive(Debug, Clone)]
pub struct ConfigTranslator {
    settings: SimulatorSettings,
    results_root: PathBuf,
}

impl ConfigTranslator {
    /// Create a translator writing below `results_root`.
    #[must_use]
    pub fn new(settings: SimulatorSettings, results_root: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            results_root: results_root.into(),
        }
    }

    /// Get the simulator settings.
    #[must_use]
    pub const fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    /// Get the results root.
    #[must_use]
    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// Check a point without building its command line.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the mesh does not divide evenly, the
    /// VC count is zero, or the swap policy is inconsistent with itself or
    /// with the network mode.
    pub fn validate(&self, point: &ExperimentPoint) -> Result<()> {
        point.cell().mesh().columns()?;
        if point.vc_count() == 0 {
            return Err(Error::InvalidConfiguration(
                "virtual channel count must be positive".to_string(),
            ));
        }
        let swap = point.swap_policy();
        swap.validate()?;
        let uses_swap = swap.enabled || swap.occupancy_threshold > 0;
        if uses_swap && self.settings.network != NetworkMode::Garnet {
            return Err(Error::InvalidConfiguration(format!(
                "port swap requires the garnet2.0 network model, not '{}'",
                self.settings.network.arg()
            )));
        }
        Ok(())
    }

    /// Build the invocation for `point`.
    ///
    /// # Errors
    ///
    /// See [`ConfigTranslator::validate`].
    pub fn translate(&self, point: &ExperimentPoint) -> Result<SimulatorInvocation> {
        self.validate(point)?;

        let key = ResultKey::for_point(point);
        let output_dir = key.under(&self.results_root);
        let s = &self.settings;
        let cores = point.network_size();

        let mut args: Vec<OsString> = vec![
            "-d".into(),
            output_dir.clone().into_os_string(),
            s.script.clone().into_os_string(),
            format!("--network={}", s.network.arg()).into(),
            format!("--num-cpus={cores}").into(),
            format!("--num-dirs={cores}").into(),
            format!("--topology={}", s.topology).into(),
            format!("--mesh-rows={}", point.row_count()).into(),
        ];

        let swap = point.swap_policy();
        if swap.enabled {
            let when = swap.when_to_swap.map_or(0, |w| w.code());
            let which = swap.which_to_swap.map_or(0, |w| w.code());
            let swap_args: [OsString; 5] = [
                "--interswap=1".into(),
                format!("--whenToSwap={when}").into(),
                format!("--whichToSwap={which}").into(),
                format!("--no-is-swap={}", u8::from(!swap.use_is_swap_bit)).into(),
                format!("--occupancy-swap={}", swap.occupancy_threshold).into(),
            ];
            args.extend(swap_args);
        }

        let traffic_args: [OsString; 6] = [
            format!("--sim-cycles={}", s.sim_cycles).into(),
            format!("--injectionrate={}", point.injection_rate().formatted()).into(),
            format!("--vcs-per-vnet={}", point.vc_count()).into(),
            format!("--inj-vnet={}", s.inj_vnet).into(),
            format!("--synthetic={}", point.traffic_pattern().synthetic_arg()).into(),
            format!("--routing-algorithm={}", point.routing_algorithm().code()).into(),
        ];
        args.extend(traffic_args);

        Ok(SimulatorInvocation {
            point: *point,
            key,
            program: s.binary.clone(),
            args,
            output_dir,
            working_dir: s.working_dir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{
        CellKey, InjectionRate, MeshSize, RoutingAlgorithm, SwapPolicy, TrafficPattern,
    };

    fn point(swap: SwapPolicy) -> ExperimentPoint {
        CellKey::new(
            MeshSize::new(64, 8),
            TrafficPattern::BitRotation,
            4,
            RoutingAlgorithm::AdaptRand,
        )
        .with_swap(swap)
        .at(InjectionRate::from_hundredths(2).unwrap())
    }

    fn args(invocation: &SimulatorInvocation) -> Vec<String> {
        invocation
            .args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_reference_command_line() {
        let translator = ConfigTranslator::new(SimulatorSettings::default(), "./results");
        let invocation = translator.translate(&point(SwapPolicy::reference())).unwrap();

        assert_eq!(invocation.program(), Path::new("build/Garnet_standalone/gem5.opt"));
        assert_eq!(
            args(&invocation),
            vec![
                "-d",
                "./results/64/ADAPT_RAND+swap-w1-l1-o0/BIT_ROTATION/vc-4/inj-0.02",
                "configs/example/garnet_synth_traffic.py",
                "--network=garnet2.0",
                "--num-cpus=64",
                "--num-dirs=64",
                "--topology=Mesh_XY",
                "--mesh-rows=8",
                "--interswap=1",
                "--whenToSwap=1",
                "--whichToSwap=1",
                "--no-is-swap=1",
                "--occupancy-swap=0",
                "--sim-cycles=100000",
                "--injectionrate=0.02",
                "--vcs-per-vnet=4",
                "--inj-vnet=0",
                "--synthetic=bit_rotation",
                "--routing-algorithm=3",
            ]
        );
    }

    #[test]
    fn test_swap_flags_omitted_when_disabled() {
        let translator = ConfigTranslator::new(SimulatorSettings::default(), "results");
        let invocation = translator.translate(&point(SwapPolicy::disabled())).unwrap();
        assert!(!args(&invocation).iter().any(|a| a.contains("swap")));
    }

    #[test]
    fn test_swap_under_simple_network_is_rejected() {
        let settings = SimulatorSettings {
            network: NetworkMode::Simple,
            ..SimulatorSettings::default()
        };
        let translator = ConfigTranslator::new(settings, "results");

        assert!(matches!(
            translator.translate(&point(SwapPolicy::reference())),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(translator.translate(&point(SwapPolicy::disabled())).is_ok());
    }

    #[test]
    fn test_uneven_mesh_is_rejected() {
        let translator = ConfigTranslator::new(SimulatorSettings::default(), "results");
        let uneven = CellKey::new(MeshSize::new(60, 8), TrafficPattern::Shuffle, 4, RoutingAlgorithm::Xy)
            .at(InjectionRate::from_hundredths(2).unwrap());
        assert!(matches!(
            translator.translate(&uneven),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_vcs_is_rejected() {
        let translator = ConfigTranslator::new(SimulatorSettings::default(), "results");
        let no_vc = CellKey::new(MeshSize::new(64, 8), TrafficPattern::Shuffle, 0, RoutingAlgorithm::Xy)
            .at(InjectionRate::from_hundredths(2).unwrap());
        assert!(translator.translate(&no_vc).is_err());
    }

    #[test]
    fn test_translation_is_deterministic() {
        let translator = ConfigTranslator::new(SimulatorSettings::default(), "results");
        let a = translator.translate(&point(SwapPolicy::reference())).unwrap();
        let b = translator.translate(&point(SwapPolicy::reference())).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.command_line(), b.command_line());
    }
}
