//! Engine configuration
//!
//! Every section has working defaults. A TOML file may override any subset:
//!
//! ```toml
//! data_dir = "/var/lib/primedex"
//!
//! [build]
//! target_prime_count = 1000000
//! segment_size = 10000
//!
//! [cache]
//! segment_capacity = 50
//! policy = "lru"
//!
//! [server]
//! http_port = 3000
//! ```

use crate::cache::EvictionPolicy;
use crate::error::{Error, Result};
use crate::server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the segment log and singleton records
    pub data_dir: PathBuf,
    pub build: BuildConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./primedex_data"),
            build: BuildConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn build(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::InvalidArgument(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.build.validate()?;
        self.cache.validate()?;
        if self.server.http_port == 0 {
            return Err(Error::InvalidArgument("http_port must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub target_prime_count: u64,
    /// Primes per persisted segment
    pub segment_size: u64,
    /// Numbers scanned per sieve window
    pub sieve_window_size: u64,
    /// Log progress every N segments (0 disables)
    pub progress_log_interval: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            target_prime_count: 10_000_000_000,
            segment_size: 1_000_000,
            sieve_window_size: 100_000_000,
            progress_log_interval: 100,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_prime_count == 0 {
            return Err(Error::InvalidArgument(
                "target_prime_count must be positive".to_string(),
            ));
        }
        if self.segment_size == 0 {
            return Err(Error::InvalidArgument("segment_size must be positive".to_string()));
        }
        if self.sieve_window_size == 0 {
            return Err(Error::InvalidArgument(
                "sieve_window_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Decompressed segments kept in memory
    pub segment_capacity: usize,
    /// Point tier holds `segment_capacity * point_multiplier` lookups
    pub point_multiplier: usize,
    pub policy: EvictionPolicy,
    /// Longest index range served by one range query
    pub max_range_len: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            segment_capacity: 100,
            point_multiplier: 10,
            policy: EvictionPolicy::InsertionOrder,
            max_range_len: 1000,
        }
    }
}

impl CacheConfig {
    pub fn point_capacity(&self) -> usize {
        self.segment_capacity.saturating_mul(self.point_multiplier)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_capacity == 0 {
            return Err(Error::InvalidArgument(
                "segment_capacity must be positive".to_string(),
            ));
        }
        if self.max_range_len == 0 {
            return Err(Error::InvalidArgument("max_range_len must be positive".to_string()));
        }
        Ok(())
    }
}
