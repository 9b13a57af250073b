//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::TempoConfig;
use std::path::Path;

/// Upper bound on the configured worker count.
const MAX_THREADS: usize = 1024;

/// Loads and validates `<project_dir>/tempo.toml`.
pub fn load_config(project_dir: &Path) -> Result<TempoConfig, ConfigError> {
    let config_path = project_dir.join("tempo.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `tempo.toml` from a string.
pub fn load_config_from_str(content: &str) -> Result<TempoConfig, ConfigError> {
    let config: TempoConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &TempoConfig) -> Result<(), ConfigError> {
    let timing = &config.timing;
    if timing.max_fixpoint_iterations == 0 {
        return Err(ConfigError::ValidationError(
            "timing.max_fixpoint_iterations must be at least 1".to_string(),
        ));
    }
    let timescale = timing.default_timescale();
    if timescale.scale_factor().is_none() {
        return Err(ConfigError::ValidationError(format!(
            "default time precision {} is coarser than time unit {}",
            timescale.precision, timescale.unit
        )));
    }
    if config.runtime.threads >= MAX_THREADS {
        return Err(ConfigError::ValidationError(format!(
            "runtime.threads must be below {MAX_THREADS}"
        )));
    }
    Ok(())
}
