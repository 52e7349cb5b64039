//! Pool configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};
use crate::{DEFAULT_INITIAL_CONNECTIONS, MAX_CONNECTIONS};

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of connections the pool will ever create
    pub max_connections: usize,

    /// Eager pool size used when `init_pool` is given a non-positive count
    pub default_initial_connections: usize,
}

impl PoolConfig {
    /// Start building a configuration
    #[must_use]
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_connections == 0 {
            return Err(PoolError::Configuration(
                "Max connections must be greater than 0".to_string(),
            ));
        }
        if self.default_initial_connections == 0 {
            return Err(PoolError::Configuration(
                "Default initial connections must be greater than 0".to_string(),
            ));
        }
        if self.default_initial_connections > self.max_connections {
            return Err(PoolError::Configuration(format!(
                "Default initial connections ({}) cannot exceed max connections ({})",
                self.default_initial_connections, self.max_connections
            )));
        }
        Ok(())
    }

    /// Number of connections `init_pool` creates for a requested count.
    ///
    /// Non-positive requests fall back to `default_initial_connections`; the result
    /// never exceeds `max_connections`.
    #[must_use]
    pub fn resolve_initial_count(&self, requested: i64) -> usize {
        let count = usize::try_from(requested)
            .ok()
            .filter(|&count| count > 0)
            .unwrap_or(self.default_initial_connections);
        count.min(self.max_connections)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: MAX_CONNECTIONS,
            default_initial_connections: DEFAULT_INITIAL_CONNECTIONS,
        }
    }
}

/// Builder for pool configurations
#[derive(Debug, Clone)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Create a new config builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Set maximum connections
    #[must_use]
    pub const fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set the fallback eager pool size
    #[must_use]
    pub const fn default_initial_connections(mut self, count: usize) -> Self {
        self.config.default_initial_connections = count;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PoolResult<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
