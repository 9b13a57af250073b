//! Configuration types deserialized from `tempo.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use tempo_common::{TimeScale, TimeUnit, TimeValue};

/// The top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct TempoConfig {
    /// Settings for the scheduling passes.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Settings for the runtime scheduling primitives.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// The `[timing]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// When `false` the design is treated as untimed: no unit is classified
    /// suspendable and event triggers are lowered to plain assignments.
    pub enabled: bool,
    /// Upper bound on classifier iterations before giving up.
    pub max_fixpoint_iterations: usize,
    /// Log a JSON dump of the netlist after every stage.
    pub dump_stages: bool,
    /// Time unit used by scopes that declare no time scale.
    #[serde(deserialize_with = "deserialize_time_value")]
    pub default_time_unit: TimeValue,
    /// Time precision used by scopes that declare no time scale.
    #[serde(deserialize_with = "deserialize_time_value")]
    pub default_time_precision: TimeValue,
}

impl TimingConfig {
    /// The time scale applied to scopes without one of their own.
    pub fn default_timescale(&self) -> TimeScale {
        TimeScale::new(self.default_time_unit, self.default_time_precision)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_fixpoint_iterations: 1000,
            dump_stages: false,
            default_time_unit: TimeValue {
                magnitude: 1,
                unit: TimeUnit::Ns,
            },
            default_time_precision: TimeValue {
                magnitude: 1,
                unit: TimeUnit::Ps,
            },
        }
    }
}

/// The `[runtime]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads. Zero runs pooled jobs on the caller's thread.
    pub threads: usize,
    /// How a waiter registered on several events is woken.
    pub wait_policy: WaitPolicy,
}

/// Wake-up policy for a continuation waiting on a set of events.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WaitPolicy {
    /// Resume as soon as any event in the set has fired.
    #[default]
    Any,
    /// Resume once every event in the set has fired.
    All,
}

/// Deserializes a [`TimeValue`] from a string such as `"10ns"`.
fn deserialize_time_value<'de, D>(deserializer: D) -> Result<TimeValue, D::Error>
where
    D: Deserializer<'de>,
{
    struct TimeValueStr;

    impl<'de> Visitor<'de> for TimeValueStr {
        type Value = TimeValue;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a time value such as \"1ns\" or \"100ps\"")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_str(TimeValueStr)
}
