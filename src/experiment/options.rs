//! Simulator option surface: traffic patterns, routing algorithms, network
//! mode, mesh shape and the router port-swap policy.
//!
//! Every numeric code here is a contract with the simulator's command line and
//! must stay byte-for-byte stable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Normalise user spelling (`west-first`, `WestFirst`, `west_first`) for matching.
fn normalise(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Synthetic traffic pattern offered by the simulator's traffic generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficPattern {
    /// Destination chosen uniformly at random
    UniformRandom,
    /// Half-way around each dimension
    Tornado,
    /// Bitwise complement of the source id
    BitComplement,
    /// Bit-reversed source id
    BitReverse,
    /// Source id rotated right by one bit
    BitRotation,
    /// Adjacent router
    Neighbor,
    /// Source id rotated left by one bit
    Shuffle,
    /// Row and column swapped
    Transpose,
}

impl TrafficPattern {
    /// All patterns, in simulator order.
    pub const ALL: [Self; 8] = [
        Self::UniformRandom,
        Self::Tornado,
        Self::BitComplement,
        Self::BitReverse,
        Self::BitRotation,
        Self::Neighbor,
        Self::Shuffle,
        Self::Transpose,
    ];

    /// Upper-case name used in result paths and reports (`BIT_ROTATION`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UniformRandom => "UNIFORM_RANDOM",
            Self::Tornado => "TORNADO",
            Self::BitComplement => "BIT_COMPLEMENT",
            Self::BitReverse => "BIT_REVERSE",
            Self::BitRotation => "BIT_ROTATION",
            Self::Neighbor => "NEIGHBOR",
            Self::Shuffle => "SHUFFLE",
            Self::Transpose => "TRANSPOSE",
        }
    }

    /// Lower-case name passed to `--synthetic=` (`bit_rotation`).
    #[must_use]
    pub const fn synthetic_arg(self) -> &'static str {
        match self {
            Self::UniformRandom => "uniform_random",
            Self::Tornado => "tornado",
            Self::BitComplement => "bit_complement",
            Self::BitReverse => "bit_reverse",
            Self::BitRotation => "bit_rotation",
            Self::Neighbor => "neighbor",
            Self::Shuffle => "shuffle",
            Self::Transpose => "transpose",
        }
    }
}

impl fmt::Display for TrafficPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrafficPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalise(s);
        Self::ALL
            .into_iter()
            .find(|p| normalise(p.name()) == wanted)
            .ok_or_else(|| Error::InvalidConfiguration(format!("unknown traffic pattern '{s}'")))
    }
}

/// Routing algorithm selected with `--routing-algorithm=<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingAlgorithm {
    /// Weight-based routing table
    Table,
    /// Dimension-order XY
    Xy,
    /// Randomised minimal
    Rand,
    /// Adaptive randomised minimal
    AdaptRand,
    /// West-first turn model
    #[serde(alias = "WestFirst")]
    WestFirst,
}

impl RoutingAlgorithm {
    /// All algorithms, in code order.
    pub const ALL: [Self; 5] = [
        Self::Table,
        Self::Xy,
        Self::Rand,
        Self::AdaptRand,
        Self::WestFirst,
    ];

    /// Integer code understood by the simulator.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Table => 0,
            Self::Xy => 1,
            Self::Rand => 2,
            Self::AdaptRand => 3,
            Self::WestFirst => 4,
        }
    }

    /// Directory name used in the result layout.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Xy => "XY",
            Self::Rand => "RAND",
            Self::AdaptRand => "ADAPT_RAND",
            Self::WestFirst => "WestFirst",
        }
    }
}

impl fmt::Display for RoutingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoutingAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::ALL
                .into_iter()
                .find(|r| r.code() == code)
                .ok_or_else(|| {
                    Error::InvalidConfiguration(format!("unknown routing algorithm code {code}"))
                });
        }
        let wanted = normalise(s);
        Self::ALL
            .into_iter()
            .find(|r| normalise(r.name()) == wanted)
            .ok_or_else(|| Error::InvalidConfiguration(format!("unknown routing algorithm '{s}'")))
    }
}

/// Network model the simulator instantiates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Detailed router model; required for any port-swap feature
    #[default]
    Garnet,
    /// Basic link-level model
    Simple,
}

impl NetworkMode {
    /// Value passed to `--network=`.
    #[must_use]
    pub const fn arg(self) -> &'static str {
        match self {
            Self::Garnet => "garnet2.0",
            Self::Simple => "simple",
        }
    }
}

impl FromStr for NetworkMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "garnet" | "garnet2.0" => Ok(Self::Garnet),
            "simple" => Ok(Self::Simple),
            _ => Err(Error::InvalidConfiguration(format!("unknown network mode '{s}'"))),
        }
    }
}

/// Mesh shape: router count and number of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeshSize {
    /// Cores (and routers, one per core)
    pub cores: u32,
    /// Rows of the mesh
    pub rows: u32,
}

impl MeshSize {
    /// Create a mesh shape without validating it; see [`MeshSize::columns`].
    #[must_use]
    pub const fn new(cores: u32, rows: u32) -> Self {
        Self { cores, rows }
    }

    /// Number of columns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` unless `rows` divides `cores` exactly.
    pub fn columns(self) -> Result<u32> {
        if self.cores == 0 || self.rows == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "mesh {self} must have at least one core and one row"
            )));
        }
        if self.cores % self.rows != 0 {
            return Err(Error::InvalidConfiguration(format!(
                "mesh {self}: {} cores cannot be split evenly into {} rows",
                self.cores, self.rows
            )));
        }
        Ok(self.cores / self.rows)
    }
}

impl fmt::Display for MeshSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cores, self.rows)
    }
}

impl FromStr for MeshSize {
    type Err = Error;

    /// Parse `64:8`, or `64` for a square mesh.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::InvalidConfiguration(format!("cannot parse mesh size '{s}'"));
        if let Some((cores, rows)) = s.split_once(':') {
            let cores = cores.trim().parse().map_err(|_| bad())?;
            let rows = rows.trim().parse().map_err(|_| bad())?;
            return Ok(Self::new(cores, rows));
        }
        let cores: u32 = s.trim().parse().map_err(|_| bad())?;
        // f64 holds every u32 exactly; the rounded root is checked in u64
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let side = f64::from(cores).sqrt().round() as u32;
        if u64::from(side) * u64::from(side) != u64::from(cores) {
            return Err(Error::InvalidConfiguration(format!(
                "mesh size '{s}' is not a perfect square; give rows explicitly as <cores>:<rows>"
            )));
        }
        Ok(Self::new(cores, side))
    }
}

/// When an upstream router initiates a port swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhenToSwap {
    /// Every TDM turn
    Tdm,
    /// Every 2nd TDM turn
    Tdm2,
    /// Every 4th TDM turn
    Tdm4,
    /// Every 8th TDM turn
    Tdm8,
    /// Every 16th TDM turn
    Tdm16,
    /// Every 32nd TDM turn
    Tdm32,
}

impl WhenToSwap {
    /// All triggers, in code order.
    pub const ALL: [Self; 6] = [
        Self::Tdm,
        Self::Tdm2,
        Self::Tdm4,
        Self::Tdm8,
        Self::Tdm16,
        Self::Tdm32,
    ];

    /// Value passed to `--whenToSwap=`.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Tdm => 1,
            Self::Tdm2 => 2,
            Self::Tdm4 => 3,
            Self::Tdm8 => 4,
            Self::Tdm16 => 5,
            Self::Tdm32 => 6,
        }
    }
}

impl FromStr for WhenToSwap {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let by_code = s.parse::<u8>().ok();
        Self::ALL
            .into_iter()
            .find(|w| Some(w.code()) == by_code || normalise(&format!("{w:?}")) == normalise(s))
            .ok_or_else(|| Error::InvalidConfiguration(format!("unknown whenToSwap '{s}'")))
    }
}

/// Which ports of the upstream router take part in a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhichToSwap {
    /// Only the N/E/W/S ports
    DisableLocal,
    /// Local ports as well
    EnableLocal,
}

impl WhichToSwap {
    /// Value passed to `--whichToSwap=`.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::DisableLocal => 1,
            Self::EnableLocal => 2,
        }
    }
}

impl FromStr for WhichToSwap {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalise(s).as_str() {
            "1" | "disablelocal" => Ok(Self::DisableLocal),
            "2" | "enablelocal" => Ok(Self::EnableLocal),
            _ => Err(Error::InvalidConfiguration(format!("unknown whichToSwap '{s}'"))),
        }
    }
}

/// Router port-swap ("interswap") configuration.
///
/// The simulator asserts that the trigger fields are set exactly when swapping
/// is enabled, so a disabled policy must carry default values everywhere;
/// [`SwapPolicy::validate`] enforces the same rules up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapPolicy {
    /// Enable port swapping
    pub enabled: bool,
    /// Swap trigger
    pub when_to_swap: Option<WhenToSwap>,
    /// Ports taking part
    pub which_to_swap: Option<WhichToSwap>,
    /// Reserved policy selector; the simulator only accepts 0
    pub policy_id: u32,
    /// Use the per-router `is_swap` bit
    pub use_is_swap_bit: bool,
    /// Swap when input-port VC occupancy exceeds this percentage (0 = off)
    pub occupancy_threshold: u8,
}

impl Default for SwapPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl SwapPolicy {
    /// Port swapping off; matches the simulator's defaults.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            when_to_swap: None,
            which_to_swap: None,
            policy_id: 0,
            use_is_swap_bit: true,
            occupancy_threshold: 0,
        }
    }

    /// Port swapping on with the given triggers, `is_swap` bit off, no occupancy trigger.
    #[must_use]
    pub const fn enabled(when: WhenToSwap, which: WhichToSwap) -> Self {
        Self {
            enabled: true,
            when_to_swap: Some(when),
            which_to_swap: Some(which),
            policy_id: 0,
            use_is_swap_bit: false,
            occupancy_threshold: 0,
        }
    }

    /// Policy the reference saturation study was run with.
    #[must_use]
    pub const fn reference() -> Self {
        Self::enabled(WhenToSwap::Tdm, WhichToSwap::DisableLocal)
    }

    /// Set the occupancy trigger.
    #[must_use]
    pub const fn with_occupancy_threshold(mut self, percent: u8) -> Self {
        self.occupancy_threshold = percent;
        self
    }

    /// Set whether the `is_swap` bit is used.
    #[must_use]
    pub const fn with_is_swap_bit(mut self, used: bool) -> Self {
        self.use_is_swap_bit = used;
        self
    }

    /// Check the policy against the simulator's own assertions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when trigger fields are missing while
    /// enabled, set while disabled, or out of range.
    pub fn validate(&self) -> Result<()> {
        if self.policy_id != 0 {
            return Err(Error::InvalidConfiguration(format!(
                "swap policy id {} is reserved; the simulator only accepts 0",
                self.policy_id
            )));
        }
        if self.occupancy_threshold > 100 {
            return Err(Error::InvalidConfiguration(format!(
                "occupancy threshold {}% exceeds 100%",
                self.occupancy_threshold
            )));
        }
        if self.enabled {
            if self.when_to_swap.is_none() || self.which_to_swap.is_none() {
                return Err(Error::InvalidConfiguration(
                    "port swap enabled without both whenToSwap and whichToSwap".to_string(),
                ));
            }
        } else if *self != Self::disabled() {
            return Err(Error::InvalidConfiguration(
                "swap policy fields set while port swap is disabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Short tag used in the result layout; `None` when swapping is disabled.
    #[must_use]
    pub fn tag(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let when = self.when_to_swap.map_or(0, WhenToSwap::code);
        let which = self.which_to_swap.map_or(0, WhichToSwap::code);
        let isb = if self.use_is_swap_bit { "-isb" } else { "" };
        Some(format!(
            "swap-w{when}-l{which}-o{}{isb}",
            self.occupancy_threshold
        ))
    }
}
