//! Runtime limits for the lifecycle core.
//!
//! Guard-rails arrive as a small YAML document (see [`RuntimeConfig`]);
//! parsing validates them, and the result stays inert until
//! [`RuntimeConfig::apply`] pushes the limits into the running core.

pub mod runtime;

pub use runtime::{MemoryLimits, RuntimeConfig};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures while reading or checking a limits document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    Serde(#[from] serde_yaml::Error),
}

/// Reads and validates a limits file.
pub fn load(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    parse(&std::fs::read_to_string(path)?)
}

/// Parses and validates a YAML limits document.
pub fn parse(yaml: &str) -> Result<RuntimeConfig, ConfigError> {
    let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}
