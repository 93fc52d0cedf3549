/// Structured error handling for the middleware crate
///
/// Only terminal failures surface through these types: a single failed fetch
/// attempt is retried internally, and a cache miss is an `Option::None`, not
/// an error.
use std::time::Duration;
use thiserror::Error;

pub type MiddlewareResult<T> = Result<T, MiddlewareError>;

#[derive(Error, Debug)]
pub enum MiddlewareError {
    /// Admission denied by the fixed-window rate limiter. Recoverable by
    /// retrying after the window rolls over.
    #[error("rate limited: caller '{caller_id}' exceeded {max_requests} requests per {window_seconds}s window")]
    RateLimited {
        caller_id: String,
        max_requests: u32,
        window_seconds: u64,
    },

    /// The wrapped operation failed after exhausting all retry attempts.
    /// Carries the last underlying error.
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    FetchFailed {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The overall deadline elapsed before the retry sequence completed.
    /// Distinct from exhausted retries.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid construction parameters. Raised at startup, never at call
    /// time.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MiddlewareError {
    /// True when the caller can reasonably retry later (the window will
    /// roll over or the upstream may recover).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MiddlewareError::RateLimited { .. }
                | MiddlewareError::FetchFailed { .. }
                | MiddlewareError::Timeout(_)
        )
    }
}
