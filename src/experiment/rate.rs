//! Injection rate in fixed two-decimal precision.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hundredths per unit rate.
const SCALE: u16 = 100;

/// Largest distance from a whole hundredth still treated as float noise.
const HUNDREDTHS_TOLERANCE: f64 = 1e-6;

/// Fraction of cycles in which a source offers a new packet, in `(0, 1]`.
///
/// Stored as integral hundredths so that the two-decimal string used on the
/// simulator command line and in result keys is exact: two distinct rates
/// never format to the same string, and stepping never accumulates float
/// drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct InjectionRate(u16);

impl InjectionRate {
    /// Highest representable rate (1.00).
    pub const MAX: Self = Self(SCALE);

    /// Default start and step of a saturation search (0.02).
    pub const DEFAULT_STEP: Self = Self(2);

    /// Create a rate from hundredths (`2` is `0.02`).
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` outside `1..=100`.
    pub fn from_hundredths(hundredths: u16) -> Result<Self> {
        if hundredths == 0 || hundredths > SCALE {
            return Err(Error::InvalidConfiguration(format!(
                "injection rate {hundredths}/100 is outside (0, 1]"
            )));
        }
        Ok(Self(hundredths))
    }

    /// Create a rate from a float holding a whole number of hundredths.
    ///
    /// Float noise such as `0.1 + 0.2` is absorbed; `0.025` is rejected
    /// rather than rounded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the value is not finite, is not a
    /// whole number of hundredths, or lies outside `(0, 1]`.
    pub fn from_f64(rate: f64) -> Result<Self> {
        if !rate.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "injection rate {rate} is not a finite number"
            )));
        }
        let exact = rate * f64::from(SCALE);
        let scaled = exact.round();
        if (exact - scaled).abs() > HUNDREDTHS_TOLERANCE {
            return Err(Error::InvalidConfiguration(format!(
                "injection rate {rate} is not a multiple of 0.01"
            )));
        }
        if scaled < 1.0 || scaled > f64::from(SCALE) {
            return Err(Error::InvalidConfiguration(format!(
                "injection rate {rate} is outside (0, 1]"
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self::from_hundredths(scaled as u16)
    }

    /// Rate in hundredths.
    #[must_use]
    pub const fn hundredths(self) -> u16 {
        self.0
    }

    /// Rate as a float.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / f64::from(SCALE)
    }

    /// Next rate `step` above this one, or `None` past 1.00.
    #[must_use]
    pub fn checked_add(self, step: Self) -> Option<Self> {
        let next = self.0.checked_add(step.0)?;
        (next <= SCALE).then_some(Self(next))
    }

    /// Two-decimal representation shared by the command line and the result
    /// key. Every formatting of a rate goes through here.
    #[must_use]
    pub fn formatted(self) -> String {
        format!("{}.{:02}", self.0 / SCALE, self.0 % SCALE)
    }
}

impl fmt::Display for InjectionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl FromStr for InjectionRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rate: f64 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfiguration(format!("cannot parse injection rate '{s}'")))?;
        Self::from_f64(rate)
    }
}

impl TryFrom<f64> for InjectionRate {
    type Error = Error;

    fn try_from(rate: f64) -> Result<Self> {
        Self::from_f64(rate)
    }
}

impl From<InjectionRate> for f64 {
    fn from(rate: InjectionRate) -> Self {
        rate.as_f64()
    }
}
