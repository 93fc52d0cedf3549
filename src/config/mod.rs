/// Configuration for the middleware components
///
/// All tunables live here with embedded defaults, so a missing or partial
/// config file still yields a working setup. `validate()` runs at
/// construction time: a bad value fails fast at startup, never at call time.
use crate::errors::{MiddlewareError, MiddlewareResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level middleware configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub retry: RetrySettings,
    pub batch: BatchSettings,
}

/// TTL cache store settings
///
/// Per-resource-class TTLs: prices move fast, ticker listings barely change,
/// analyses sit in between.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of entries (LRU eviction when exceeded)
    pub capacity: usize,
    /// TTL for price quotes, in seconds
    pub prices_ttl_secs: u64,
    /// TTL for ticker/instrument listings, in seconds
    pub tickers_ttl_secs: u64,
    /// TTL for computed analyses, in seconds
    pub analyses_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 128,
            prices_ttl_secs: 300,    // 5 minutes
            tickers_ttl_secs: 3600,  // 1 hour
            analyses_ttl_secs: 1800, // 30 minutes
        }
    }
}

/// Fixed-window rate limiter settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub window_seconds: u64,
    pub max_requests: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            max_requests: 100,
        }
    }
}

/// Retry executor settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Jitter added on top of each backoff delay, as a fraction of the delay
    pub jitter_fraction: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_fraction: 0.25,
        }
    }
}

/// Batch optimizer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub max_batch_size: usize,
    pub max_wait_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            max_wait_ms: 100,
        }
    }
}

impl MiddlewareConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any missing section or field
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> MiddlewareResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MiddlewareError::Configuration(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: MiddlewareConfig = toml::from_str(&raw)
            .map_err(|e| MiddlewareError::Configuration(format!("invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections, failing on the first bad value
    pub fn validate(&self) -> MiddlewareResult<()> {
        if self.cache.capacity == 0 {
            return Err(MiddlewareError::Configuration(
                "cache.capacity must be greater than 0".to_string(),
            ));
        }
        for (name, ttl) in [
            ("cache.prices_ttl_secs", self.cache.prices_ttl_secs),
            ("cache.tickers_ttl_secs", self.cache.tickers_ttl_secs),
            ("cache.analyses_ttl_secs", self.cache.analyses_ttl_secs),
        ] {
            if ttl == 0 {
                return Err(MiddlewareError::Configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        if self.rate_limit.window_seconds == 0 {
            return Err(MiddlewareError::Configuration(
                "rate_limit.window_seconds must be greater than 0".to_string(),
            ));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(MiddlewareError::Configuration(
                "rate_limit.max_requests must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(MiddlewareError::Configuration(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(MiddlewareError::Configuration(
                "retry.base_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(MiddlewareError::Configuration(
                "retry.max_delay_ms must be at least retry.base_delay_ms".to_string(),
            ));
        }
        if !self.retry.jitter_fraction.is_finite() || self.retry.jitter_fraction < 0.0 {
            return Err(MiddlewareError::Configuration(
                "retry.jitter_fraction must be a finite value >= 0".to_string(),
            ));
        }
        if self.batch.max_batch_size == 0 {
            return Err(MiddlewareError::Configuration(
                "batch.max_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.batch.max_wait_ms == 0 {
            return Err(MiddlewareError::Configuration(
                "batch.max_wait_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl BatchSettings {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}
