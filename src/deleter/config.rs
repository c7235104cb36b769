//! Deleter Configuration

use std::time::Duration;
use thiserror::Error;

/// Reasons a [`DeleterConfig`] is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The retention target must leave at least one key alive
    #[error("keep_num must be greater than zero")]
    ZeroKeep,

    /// The event queue needs room for at least one event
    #[error("buffer_size must be greater than zero")]
    ZeroBuffer,

    /// The sweep timer cannot tick with a zero period
    #[error("sweep_interval must be greater than zero")]
    ZeroInterval,
}

/// Settings for a [`Deleter`](super::Deleter). Fixed once the deleter is
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleterConfig {
    /// Entries not touched for this long are evicted on the next sweep
    /// (default: 10 minutes)
    pub max_age: Duration,

    /// Time between sweeps (default: 30s)
    pub sweep_interval: Duration,

    /// Population the table is trimmed back to once it grows 10% past it
    /// (default: 200,000)
    pub keep_num: usize,

    /// Capacity of the event queue; producers wait when it is full
    /// (default: 10,000)
    pub buffer_size: usize,
}

impl Default for DeleterConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(30),
            keep_num: 200_000,
            buffer_size: 10_000,
        }
    }
}

impl DeleterConfig {
    /// Sets the maximum entry age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Sets the period between sweeps.
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Sets the retention target.
    pub fn with_keep_num(mut self, keep_num: usize) -> Self {
        self.keep_num = keep_num;
        self
    }

    /// Sets the event queue capacity.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Checks that the settings describe a deleter that can run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keep_num == 0 {
            return Err(ConfigError::ZeroKeep);
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBuffer);
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}
