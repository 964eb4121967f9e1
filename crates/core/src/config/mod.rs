//! Cache configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (RESCACHE_*)
//! 2. TOML config file (if RESCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::ReloadMode;

mod validation;

pub use validation::ConfigError;

/// Cache engine and transport configuration.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (RESCACHE_*)
/// 2. TOML config file (if RESCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Byte budget for unreferenced entries before the collector evicts.
    ///
    /// Set via RESCACHE_MEMORY_CACHE_SIZE environment variable.
    #[serde(default = "default_memory_cache_size")]
    pub memory_cache_size: u64,

    /// Maximum redirect hops followed through the cache.
    ///
    /// Set via RESCACHE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Minimum interval between periodic collection passes, in milliseconds.
    /// Zero disables periodic collection.
    ///
    /// Set via RESCACHE_GC_INTERVAL_MS environment variable.
    #[serde(default = "default_gc_interval_ms")]
    pub gc_interval_ms: u64,

    /// Ignore server-provided expiry (Cache-Control, Expires).
    ///
    /// Set via RESCACHE_IGNORE_CACHE_CONTROL environment variable.
    #[serde(default)]
    pub ignore_cache_control: bool,

    /// Reload mode used when the caller does not ask for one.
    ///
    /// Set via RESCACHE_DEFAULT_MODE environment variable.
    #[serde(default)]
    pub default_mode: ReloadMode,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via RESCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to store per resource.
    ///
    /// Set via RESCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via RESCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_memory_cache_size() -> u64 {
    1024 * 1024 // 1MB
}

fn default_max_redirects() -> usize {
    10
}

fn default_gc_interval_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    "rescache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_cache_size: default_memory_cache_size(),
            max_redirects: default_max_redirects(),
            gc_interval_ms: default_gc_interval_ms(),
            ignore_cache_control: false,
            default_mode: ReloadMode::default(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Periodic collection interval, or `None` when disabled.
    pub fn gc_interval(&self) -> Option<chrono::Duration> {
        match self.gc_interval_ms {
            0 => None,
            ms => Some(chrono::Duration::milliseconds(ms as i64)),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `RESCACHE_`
    /// 2. TOML file from `RESCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("RESCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("RESCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
