//! Time units and time scales with unit parsing and display.
//!
//! A scope's time scale pairs the unit its delay literals are written in with
//! the precision the simulation clock counts in. Delays are normalized to
//! precision ticks by multiplying with [`TimeScale::scale_factor`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A power-of-one-thousand time unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Seconds.
    S,
    /// Milliseconds.
    Ms,
    /// Microseconds.
    Us,
    /// Nanoseconds.
    Ns,
    /// Picoseconds.
    Ps,
    /// Femtoseconds.
    Fs,
}

impl TimeUnit {
    /// Returns the base-ten exponent of this unit relative to one second.
    pub fn exponent(self) -> i32 {
        match self {
            TimeUnit::S => 0,
            TimeUnit::Ms => -3,
            TimeUnit::Us => -6,
            TimeUnit::Ns => -9,
            TimeUnit::Ps => -12,
            TimeUnit::Fs => -15,
        }
    }

    /// Returns the suffix used when parsing and displaying this unit.
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
            TimeUnit::Ps => "ps",
            TimeUnit::Fs => "fs",
        }
    }
}

/// A time literal of the form `1`, `10` or `100` times a [`TimeUnit`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TimeValue {
    /// One of 1, 10 or 100.
    pub magnitude: u32,
    /// The unit the magnitude is expressed in.
    pub unit: TimeUnit,
}

impl TimeValue {
    /// Creates a time value. Returns `None` if `magnitude` is not 1, 10 or 100.
    pub fn new(magnitude: u32, unit: TimeUnit) -> Option<Self> {
        matches!(magnitude, 1 | 10 | 100).then_some(Self { magnitude, unit })
    }

    /// Returns the base-ten exponent of this value relative to one second.
    pub fn exponent(&self) -> i32 {
        let digits = match self.magnitude {
            100 => 2,
            10 => 1,
            _ => 0,
        };
        self.unit.exponent() + digits
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

/// Error type for parsing time values and time scales.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeError {
    /// The input string that failed to parse.
    pub input: String,
}

impl fmt::Display for ParseTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time value: '{}'", self.input)
    }
}

impl std::error::Error for ParseTimeError {}

impl FromStr for TimeValue {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseTimeError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        // Longest suffixes first so "ms" is not read as "s".
        let units = [
            TimeUnit::Ms,
            TimeUnit::Us,
            TimeUnit::Ns,
            TimeUnit::Ps,
            TimeUnit::Fs,
            TimeUnit::S,
        ];
        for unit in units {
            if let Some(num) = lower.strip_suffix(unit.suffix()) {
                let magnitude: u32 = num.trim().parse().map_err(|_| err())?;
                return TimeValue::new(magnitude, unit).ok_or_else(err);
            }
        }
        Err(err())
    }
}

/// The unit/precision pair that applies to a scope.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TimeScale {
    /// Unit that delay literals in the scope are written in.
    pub unit: TimeValue,
    /// Resolution of the simulation clock.
    pub precision: TimeValue,
}

impl TimeScale {
    /// Creates a new time scale.
    pub fn new(unit: TimeValue, precision: TimeValue) -> Self {
        Self { unit, precision }
    }

    /// Returns `10^(unit - precision)`, the number of precision ticks per unit.
    ///
    /// Returns `None` if the precision is coarser than the unit or the factor
    /// does not fit in a `u64`.
    pub fn scale_factor(&self) -> Option<u64> {
        let diff = self.unit.exponent() - self.precision.exponent();
        u32::try_from(diff).ok().and_then(|d| 10u64.checked_pow(d))
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self {
            unit: TimeValue {
                magnitude: 1,
                unit: TimeUnit::Ns,
            },
            precision: TimeValue {
                magnitude: 1,
                unit: TimeUnit::Ps,
            },
        }
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.unit, self.precision)
    }
}

impl FromStr for TimeScale {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (unit, precision) = s.split_once('/').ok_or_else(|| ParseTimeError {
            input: s.trim().to_string(),
        })?;
        Ok(TimeScale::new(unit.parse()?, precision.parse()?))
    }
}
