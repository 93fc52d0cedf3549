//! marketcache - performance middleware for market-data fetching
//!
//! Cross-cutting operational plumbing for a stock-market data application:
//! a TTL cache with LRU eviction, a fixed-window rate limiter for outbound
//! provider calls, a retry executor with exponential backoff and jitter, a
//! batch optimizer that coalesces concurrent requests, and the
//! [`CacheManager`](manager::CacheManager) that ties them together.
//!
//! The upstream fetch itself, input validation and persistence are the host
//! application's business; this crate only sees an opaque async fetch
//! operation, an injected clock and its own logger.

pub mod batch;
pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod logger;
pub mod manager;
pub mod ratelimit;
pub mod retry;

pub use batch::{BatchFetcher, BatchOptimizer};
pub use cache::{CacheMetrics, ResourceClass, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MiddlewareConfig;
pub use errors::{MiddlewareError, MiddlewareResult};
pub use manager::CacheManager;
pub use ratelimit::FixedWindowLimiter;
pub use retry::RetryExecutor;
