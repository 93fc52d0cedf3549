/// Fixed-window rate limiter for outbound provider calls
///
/// Counts admissions per caller in discrete, non-overlapping windows.
/// Fixed-window (not sliding-log) keeps memory at O(1) per caller. Up to 2x
/// the limit can be admitted across one window boundary, which is acceptable
/// for protecting an upstream API.
///
/// A request over the limit is rejected, never queued or blocked.
use crate::clock::Clock;
use crate::config::RateLimitSettings;
use crate::errors::{MiddlewareError, MiddlewareResult};
use crate::logger;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

struct Window {
    window_start: Instant,
    count: u32,
}

pub struct FixedWindowLimiter {
    settings: RateLimitSettings,
    windows: Mutex<HashMap<String, Window>>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    /// Create a limiter, validating the window parameters up front
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> MiddlewareResult<Self> {
        if settings.window_seconds == 0 {
            return Err(MiddlewareError::Configuration(
                "rate limit window must be greater than 0 seconds".to_string(),
            ));
        }
        if settings.max_requests == 0 {
            return Err(MiddlewareError::Configuration(
                "rate limit max_requests must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            settings,
            windows: Mutex::new(HashMap::new()),
            clock,
        })
    }

    /// Admit or reject a request for the given caller
    ///
    /// Returns `true` and charges the window when under the limit. A
    /// rejection emits an audit event; the decision itself is the caller's
    /// error to surface.
    pub fn try_admit(&self, caller_id: &str) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows.lock();

        let window = windows.entry(caller_id.to_string()).or_insert(Window {
            window_start: now,
            count: 0,
        });

        // Window rolls over exactly at window_start + window_size
        if now.saturating_duration_since(window.window_start) >= self.settings.window() {
            window.window_start = now;
            window.count = 0;
        }

        if window.count >= self.settings.max_requests {
            drop(windows);
            logger::audit(
                "rate_limit_rejected",
                serde_json::json!({
                    "caller_id": caller_id,
                    "max_requests": self.settings.max_requests,
                    "window_seconds": self.settings.window_seconds,
                }),
            );
            return false;
        }

        window.count += 1;
        true
    }

    /// Build the error surfaced to callers on rejection
    pub fn rejection_error(&self, caller_id: &str) -> MiddlewareError {
        MiddlewareError::RateLimited {
            caller_id: caller_id.to_string(),
            max_requests: self.settings.max_requests,
            window_seconds: self.settings.window_seconds,
        }
    }

    /// Drop windows that have been idle for a full window
    ///
    /// Keeps the per-caller map bounded for long-running processes with
    /// churning caller populations. Returns the number of windows dropped.
    pub fn prune_stale(&self) -> usize {
        let now = self.clock.now();
        let window_size = self.settings.window();
        let mut windows = self.windows.lock();

        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.window_start) < window_size);
        before - windows.len()
    }

    /// Number of callers currently tracked
    pub fn tracked_callers(&self) -> usize {
        self.windows.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn limiter(max_requests: u32, window_seconds: u64) -> (FixedWindowLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let settings = RateLimitSettings {
            window_seconds,
            max_requests,
        };
        (
            FixedWindowLimiter::new(settings, clock.clone()).expect("valid settings"),
            clock,
        )
    }

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let (limiter, clock) = limiter(3, 60);

        let mut results = Vec::new();
        for _ in 0..4 {
            results.push(limiter.try_admit("user1"));
            clock.advance(Duration::from_secs(2)); // four calls within 10s
        }
        assert_eq!(results, vec![true, true, true, false]);
    }

    #[test]
    fn test_window_resets_exactly_at_boundary() {
        let (limiter, clock) = limiter(2, 60);

        assert!(limiter.try_admit("user1"));
        assert!(limiter.try_admit("user1"));
        assert!(!limiter.try_admit("user1"));

        // One second before the boundary: still the same window
        clock.advance(Duration::from_secs(59));
        assert!(!limiter.try_admit("user1"));

        // Exactly at window_start + window_size: fresh window
        clock.advance(Duration::from_secs(1));
        assert!(limiter.try_admit("user1"));
    }

    #[test]
    fn test_callers_are_independent() {
        let (limiter, _clock) = limiter(1, 60);

        assert!(limiter.try_admit("user1"));
        assert!(!limiter.try_admit("user1"));
        assert!(limiter.try_admit("user2"));
    }

    #[test]
    fn test_prune_drops_idle_windows_only() {
        let (limiter, clock) = limiter(5, 60);

        assert!(limiter.try_admit("old"));
        clock.advance(Duration::from_secs(61));
        assert!(limiter.try_admit("fresh"));

        assert_eq!(limiter.prune_stale(), 1);
        assert_eq!(limiter.tracked_callers(), 1);
    }

    #[test]
    fn test_invalid_settings_fail_at_construction() {
        let clock: Arc<ManualClock> = Arc::new(ManualClock::new());
        let bad_window = RateLimitSettings {
            window_seconds: 0,
            max_requests: 10,
        };
        assert!(FixedWindowLimiter::new(bad_window, clock.clone()).is_err());

        let bad_max = RateLimitSettings {
            window_seconds: 60,
            max_requests: 0,
        };
        assert!(FixedWindowLimiter::new(bad_max, clock).is_err());
    }
}
