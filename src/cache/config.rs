//! Cache configuration

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_AGE_SECONDS, DEFAULT_MAX_CACHE_SIZE_MB, DEFAULT_MAX_ITEM_SIZE_MB};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Cache-Control max-age and entry TTL, in seconds
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
    #[serde(default = "default_max_cache_size_mb")]
    pub max_cache_size_mb: u64,
    #[serde(default = "default_max_item_size_mb")]
    pub max_item_size_mb: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_age_seconds: default_max_age_seconds(),
            max_cache_size_mb: default_max_cache_size_mb(),
            max_item_size_mb: default_max_item_size_mb(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_age_seconds() -> u64 {
    DEFAULT_MAX_AGE_SECONDS
}

fn default_max_cache_size_mb() -> u64 {
    DEFAULT_MAX_CACHE_SIZE_MB
}

fn default_max_item_size_mb() -> u64 {
    DEFAULT_MAX_ITEM_SIZE_MB
}

impl CacheConfig {
    /// Convert max_item_size_mb to bytes
    pub fn max_item_size_bytes(&self) -> u64 {
        self.max_item_size_mb * 1024 * 1024
    }

    /// Convert max_cache_size_mb to bytes
    pub fn max_cache_size_bytes(&self) -> u64 {
        self.max_cache_size_mb * 1024 * 1024
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_item_size_mb > self.max_cache_size_mb {
            return Err(format!(
                "max_item_size_mb ({}) cannot exceed max_cache_size_mb ({})",
                self.max_item_size_mb, self.max_cache_size_mb
            ));
        }
        if self.enabled && self.max_cache_size_mb == 0 {
            return Err("max_cache_size_mb must be greater than 0".to_string());
        }
        Ok(())
    }
}
