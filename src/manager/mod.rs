/// Cache manager: the orchestrating front door of the middleware
///
/// Composes the TTL cache store, the rate limiter, the retry executor and
/// (optionally) the batch optimizer behind `get_or_fetch`. Constructed
/// explicitly by the application's composition root with its clock injected;
/// there is no hidden global instance.
///
/// Miss path ordering is fixed: cache check, then rate-limit admission, then
/// the retry-wrapped fetch, then the store. A cache hit never charges the
/// rate limit, a rejection never falls through to a stale value, and a
/// failed or cancelled fetch never populates the cache.
use crate::batch::BatchOptimizer;
use crate::cache::{CacheMetrics, ResourceClass, TtlCache};
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheSettings, MiddlewareConfig};
use crate::errors::MiddlewareResult;
use crate::logger::{self, LogTag};
use crate::ratelimit::FixedWindowLimiter;
use crate::retry::RetryExecutor;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct CacheManager<V>
where
    V: Clone,
{
    cache: TtlCache<String, V>,
    limiter: FixedWindowLimiter,
    retry: RetryExecutor,
    cache_settings: CacheSettings,
}

impl<V> CacheManager<V>
where
    V: Clone,
{
    /// Create a manager from validated configuration and an injected clock
    pub fn new(config: MiddlewareConfig, clock: Arc<dyn Clock>) -> MiddlewareResult<Self> {
        config.validate()?;

        let cache = TtlCache::new(config.cache.capacity, clock.clone())?;
        let limiter = FixedWindowLimiter::new(config.rate_limit.clone(), clock)?;
        let retry = RetryExecutor::new(config.retry.clone())?;

        logger::info(
            LogTag::Config,
            &format!(
                "cache manager ready: capacity {}, {} req / {}s window, {} retry attempt(s)",
                config.cache.capacity,
                config.rate_limit.max_requests,
                config.rate_limit.window_seconds,
                config.retry.max_attempts
            ),
        );

        Ok(Self {
            cache,
            limiter,
            retry,
            cache_settings: config.cache,
        })
    }

    /// Create a manager running on the system clock
    pub fn with_system_clock(config: MiddlewareConfig) -> MiddlewareResult<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    /// Serve from cache or fetch, rate-limit-checked and retry-wrapped
    ///
    /// On a terminal failure the error propagates and nothing is cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        caller_id: &str,
        fetch: F,
    ) -> MiddlewareResult<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let key = key.to_string();
        if let Some(value) = self.cache.get(&key) {
            logger::verbose(LogTag::Cache, &format!("hit for '{}'", key));
            return Ok(value);
        }

        self.admit(caller_id)?;

        let value = self.retry.execute(fetch).await?;
        self.cache.set(key.clone(), value.clone(), ttl);
        logger::debug(LogTag::Cache, &format!("stored '{}' (ttl {:?})", key, ttl));
        Ok(value)
    }

    /// Same as [`get_or_fetch`](Self::get_or_fetch) with an overall deadline
    /// spanning all retry attempts
    pub async fn get_or_fetch_with_timeout<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        caller_id: &str,
        fetch: F,
        overall: Duration,
    ) -> MiddlewareResult<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let key = key.to_string();
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        self.admit(caller_id)?;

        let value = self.retry.execute_with_timeout(fetch, overall).await?;
        self.cache.set(key.clone(), value.clone(), ttl);
        Ok(value)
    }

    /// Convenience wrapper keying and TTL-ing by resource class
    ///
    /// `get_or_fetch_class(Prices, "AAPL", ...)` caches under `prices_AAPL`
    /// with the configured prices TTL.
    pub async fn get_or_fetch_class<F, Fut>(
        &self,
        class: ResourceClass,
        ident: &str,
        caller_id: &str,
        fetch: F,
    ) -> MiddlewareResult<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let key = class.key(ident);
        let ttl = class.ttl(&self.cache_settings);
        self.get_or_fetch(&key, ttl, caller_id, fetch).await
    }

    /// Read-only cache probe; never fetches and never charges the limiter
    pub fn get_cached(&self, key: &str) -> Option<V> {
        self.cache.get(&key.to_string())
    }

    pub fn invalidate(&self, key: &str) {
        self.cache.invalidate(&key.to_string());
    }

    /// Sweep expired entries and idle rate-limit windows
    ///
    /// Intended to be called from a periodic housekeeping task.
    pub fn clear_expired(&self) -> usize {
        self.limiter.prune_stale();
        self.cache.clear_expired()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn admit(&self, caller_id: &str) -> MiddlewareResult<()> {
        if self.limiter.try_admit(caller_id) {
            Ok(())
        } else {
            // Never fall through to a stale value on rejection.
            Err(self.limiter.rejection_error(caller_id))
        }
    }
}

impl<V> CacheManager<V>
where
    V: Clone + Send + 'static,
{
    /// Serve from cache or fetch through a batch optimizer
    ///
    /// For resource classes opted into batching: the physical call is
    /// coalesced with concurrent requests by the optimizer, which carries
    /// its own retry-wrapped upstream call.
    pub async fn get_or_fetch_batched(
        &self,
        key: &str,
        ttl: Duration,
        caller_id: &str,
        optimizer: &BatchOptimizer<V>,
    ) -> MiddlewareResult<V> {
        let key = key.to_string();
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        self.admit(caller_id)?;

        let value = optimizer.enqueue(key.clone()).await?;
        self.cache.set(key.clone(), value.clone(), ttl);
        Ok(value)
    }
}
