//! Sweep configuration.
//!
//! Every knob of a sweep lives in one [`SweepConfig`], loaded in layers:
//!
//! ```text
//! serialized defaults
//!   < TOML file (--config)
//!   < NOC_SWEEP_* environment variables (nested keys split on "__")
//!   < command-line flags (applied by the binary)
//! ```
//!
//! For example `NOC_SWEEP_SIMULATOR__TIMEOUT_SECS=600` sets
//! `simulator.timeout_secs`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::harvest::DEFAULT_HARVEST_CEILING;
use crate::search::SearchParams;
use crate::sweep::SweepAxes;
use crate::translate::{ConfigTranslator, SimulatorSettings};
use crate::{Error, Result};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "NOC_SWEEP_";

/// Complete configuration of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Directory holding one sub-directory per experiment point
    pub results_root: PathBuf,
    /// Simulator binary, script and fixed flags
    pub simulator: SimulatorSettings,
    /// Sweep grid
    pub axes: SweepAxes,
    /// Saturation search bounds
    pub search: SearchParams,
    /// Ceiling of the extraction-only pass
    pub harvest_ceiling: f64,
    /// Cells simulated at once; 0 uses the available parallelism
    pub workers: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            results_root: PathBuf::from("results"),
            simulator: SimulatorSettings::default(),
            axes: SweepAxes::default(),
            search: SearchParams::default(),
            harvest_ceiling: DEFAULT_HARVEST_CEILING,
            workers: 0,
        }
    }
}

impl SweepConfig {
    /// Layered provider: defaults, then `file` if given, then environment.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or malformed, a value has
    /// the wrong type, or validation fails.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        if let Some(file) = file {
            if !file.is_file() {
                return Err(Error::ConfigError(format!(
                    "config file {} does not exist",
                    file.display()
                )));
            }
        }
        let config: Self = Self::figment(file)
            .extract()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values a sweep cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty axis, a zero VC count or timeout,
    /// a bad search bound, or a non-positive harvest ceiling.
    pub fn validate(&self) -> Result<()> {
        self.axes.validate()?;
        if self.axes.vcs.contains(&0) {
            return Err(Error::ConfigError(
                "virtual channel counts must be positive".to_string(),
            ));
        }
        for mesh in &self.axes.meshes {
            mesh.columns()
                .map_err(|e| Error::ConfigError(format!("mesh {mesh}: {e}")))?;
        }
        for policy in &self.axes.swap_policies {
            policy.validate().map_err(|e| Error::ConfigError(e.to_string()))?;
        }
        self.search.validate()?;
        if !(self.harvest_ceiling.is_finite() && self.harvest_ceiling > 0.0) {
            return Err(Error::ConfigError(format!(
                "harvest ceiling must be a positive number, got {}",
                self.harvest_ceiling
            )));
        }
        if self.simulator.timeout_secs == 0 {
            return Err(Error::ConfigError(
                "simulator timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count with 0 resolved to the available parallelism.
    #[must_use]
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }

    /// Per-run wall-clock budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.simulator.timeout_secs)
    }

    /// Translator for this configuration.
    #[must_use]
    pub fn translator(&self) -> ConfigTranslator {
        ConfigTranslator::new(self.simulator.clone(), &self.results_root)
    }
}
