//! Configuration validation rules.
//!
//! This module provides validation logic for `CacheConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::cache::ReloadMode;
use crate::config::CacheConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `memory_cache_size` is 0
    /// - `max_redirects` is 0 or exceeds 64
    /// - `default_mode` is `never`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_cache_size == 0 {
            return Err(ConfigError::Invalid {
                field: "memory_cache_size".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_redirects == 0 || self.max_redirects > 64 {
            return Err(ConfigError::Invalid { field: "max_redirects".into(), reason: "must be within 1..=64".into() });
        }

        if self.default_mode == ReloadMode::Never {
            return Err(ConfigError::Invalid {
                field: "default_mode".into(),
                reason: "never disables the cache; request it per transfer instead".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.max_bytes as u64 > self.memory_cache_size {
            tracing::warn!(
                max_bytes = self.max_bytes,
                memory_cache_size = self.memory_cache_size,
                "a single resource may exceed the whole cache budget"
            );
        }

        Ok(())
    }
}
