//! Configuration for indexed data channels
//!
//! Centralized configuration with sensible defaults.

use crate::store::{DEFAULT_CACHE_SIZE, DEFAULT_TIME_STAMP_INTERVAL_SECS};

/// Settings for creating or opening one channel.
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Flush threshold of the stream caches, in bytes
    pub cache_size: usize,

    /// Run cache drains on a background worker instead of inline
    pub async_cache: bool,

    // -------------------------------------------------------------------------
    // Channel Configuration
    // -------------------------------------------------------------------------
    /// Target wall-clock gap between index records
    pub time_stamp_interval_secs: u32,

    /// Samples per second; used when creating a fresh channel
    pub datarate: f32,

    /// Application-defined stream type tag stored in the header
    pub data_type: u32,

    /// Rewrite an existing channel from the start instead of appending.
    /// Implies writes do not seek to the end first.
    pub overwrite: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            async_cache: false,
            time_stamp_interval_secs: DEFAULT_TIME_STAMP_INTERVAL_SECS,
            datarate: 1.0,
            data_type: 0,
            overwrite: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.config.cache_size = bytes;
        self
    }

    pub fn async_cache(mut self, enabled: bool) -> Self {
        self.config.async_cache = enabled;
        self
    }

    pub fn time_stamp_interval_secs(mut self, seconds: u32) -> Self {
        self.config.time_stamp_interval_secs = seconds;
        self
    }

    pub fn datarate(mut self, samples_per_second: f32) -> Self {
        self.config.datarate = samples_per_second;
        self
    }

    pub fn data_type(mut self, tag: u32) -> Self {
        self.config.data_type = tag;
        self
    }

    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.config.overwrite = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
