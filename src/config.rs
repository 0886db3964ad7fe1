//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default maximum number of entries before capacity eviction kicks in
pub const DEFAULT_CAPACITY_LIMIT: usize = 1;
/// Default size weight of an entry
pub const DEFAULT_ENTRY_SIZE: u64 = 1;
/// Default time-to-live in seconds
pub const DEFAULT_TTL_SECS: u64 = 30;
/// Default interval between expiry sweeps in milliseconds
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry count at which a `put` triggers capacity eviction
    pub capacity_limit: usize,
    /// Size weight for entries without an explicit size
    pub default_entry_size: u64,
    /// TTL for entries without an explicit TTL
    pub default_ttl: Duration,
    /// How often the in-memory store sweeps expired entries
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY_LIMIT` - Entry count limit (default: 1)
    /// - `CACHE_ENTRY_SIZE` - Default entry size weight (default: 1)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 30)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Expiry sweep frequency in milliseconds (default: 1000)
    ///
    /// Unparsable values fall back to the defaults; range checks are left to
    /// [`CacheConfig::validate`].
    pub fn from_env() -> Self {
        Self {
            capacity_limit: env_or("CACHE_CAPACITY_LIMIT", DEFAULT_CAPACITY_LIMIT),
            default_entry_size: env_or("CACHE_ENTRY_SIZE", DEFAULT_ENTRY_SIZE),
            default_ttl: Duration::from_secs(env_or("CACHE_DEFAULT_TTL", DEFAULT_TTL_SECS)),
            sweep_interval: Duration::from_millis(env_or(
                "CACHE_SWEEP_INTERVAL_MS",
                DEFAULT_SWEEP_INTERVAL_MS,
            )),
        }
    }

    /// Sets the capacity limit.
    pub fn with_capacity_limit(mut self, capacity_limit: usize) -> Self {
        self.capacity_limit = capacity_limit;
        self
    }

    /// Sets the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the sweep interval of the in-memory store.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Rejects out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<()> {
        validate_capacity_limit(self.capacity_limit)?;
        validate_entry_size(self.default_entry_size)?;
        validate_ttl(self.default_ttl)?;
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_limit: DEFAULT_CAPACITY_LIMIT,
            default_entry_size: DEFAULT_ENTRY_SIZE,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

pub(crate) fn validate_capacity_limit(limit: usize) -> Result<()> {
    if limit < 1 {
        return Err(CacheError::InvalidConfig(format!(
            "capacity limit must be at least 1, got {}",
            limit
        )));
    }
    Ok(())
}

pub(crate) fn validate_entry_size(size: u64) -> Result<()> {
    if size == 0 {
        return Err(CacheError::InvalidConfig(
            "entry size weight must be positive".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_ttl(ttl: Duration) -> Result<()> {
    if ttl.is_zero() {
        return Err(CacheError::InvalidConfig(
            "ttl must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
