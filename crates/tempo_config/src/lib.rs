//! Loading and validation of `tempo.toml`.
//!
//! The `[timing]` table controls the scheduling passes and the `[runtime]`
//! table sizes the worker pool and picks the event wait policy.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::{RuntimeConfig, TempoConfig, TimingConfig, WaitPolicy};
