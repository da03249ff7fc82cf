//! Runtime configuration parameters.

use serde::Deserialize;

use super::ConfigError;
use crate::{autorelease, heap};

/// Main runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Memory guard-rails
    #[serde(default)]
    pub memory: MemoryLimits,
}

/// Memory guard-rail configuration
#[derive(Debug, Deserialize)]
pub struct MemoryLimits {
    /// Upper bound on a single heap request in bytes (0 = unlimited)
    #[serde(default = "default_max_allocation_bytes")]
    pub max_allocation_bytes: usize,

    /// Autorelease-pool entry count that triggers a warning (0 = disabled)
    #[serde(default = "default_warn_pool_entries")]
    pub warn_pool_entries: usize,
}

fn default_max_allocation_bytes() -> usize {
    0
}

fn default_warn_pool_entries() -> usize {
    65536
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_allocation_bytes: default_max_allocation_bytes(),
            warn_pool_entries: default_warn_pool_entries(),
        }
    }
}

impl RuntimeConfig {
    /// Validates configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limit = self.memory.max_allocation_bytes;
        if limit != 0 && limit < heap::DEFAULT_ALIGN {
            return Err(ConfigError::Validation(format!(
                "max_allocation_bytes {} is below the allocation granularity of {} bytes",
                limit,
                heap::DEFAULT_ALIGN
            )));
        }
        Ok(())
    }

    /// Applies the limits to the running core.
    pub fn apply(&self) {
        heap::set_max_allocation(self.memory.max_allocation_bytes);
        autorelease::set_warn_pool_entries(self.memory.warn_pool_entries);
    }
}
