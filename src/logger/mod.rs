//! Structured logging for the middleware components
//!
//! Provides a small, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-component tags for scannable output
//! - Minimum-level filtering configured at startup
//! - Audit events with structured fields for security-relevant rejections
//!
//! ## Usage
//!
//! ```rust
//! use marketcache::logger::{self, LogTag};
//!
//! logger::info(LogTag::Cache, "cache warmed");
//! logger::warning(LogTag::Retry, "retry budget half spent");
//! logger::audit(
//!     "rate_limit_rejected",
//!     serde_json::json!({ "caller_id": "user1" }),
//! );
//! ```
//!
//! Logging is strictly a side effect: a failure to write a log line is never
//! propagated into a middleware result.

mod format;
mod levels;
mod tags;

pub use levels::LogLevel;
pub use tags::LogTag;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;

static MIN_LEVEL: Lazy<RwLock<LogLevel>> = Lazy::new(|| RwLock::new(LogLevel::Info));

/// Set the minimum level below which messages are dropped
///
/// Call once at startup. Errors are always shown regardless of threshold.
pub fn set_min_level(level: LogLevel) {
    *MIN_LEVEL.write() = level;
}

/// Read the `MARKETCACHE_LOG` environment variable and apply it, if set
pub fn init_from_env() {
    if let Ok(value) = std::env::var("MARKETCACHE_LOG") {
        if let Some(level) = LogLevel::parse(&value) {
            set_min_level(level);
        }
    }
}

fn should_log(level: LogLevel) -> bool {
    // Errors always log
    level == LogLevel::Error || level <= *MIN_LEVEL.read()
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(level) {
        return;
    }
    format::format_and_log(tag, level.as_str(), message);
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (very detailed tracing)
pub fn verbose(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Verbose, message);
}

/// Log a security/audit event with structured fields
///
/// Used for rate-limit rejections and similar admission decisions that an
/// operator may want to trace back to a caller. Audit events log at WARNING
/// level under the AUDIT tag with the fields serialized as compact JSON.
pub fn audit(event: &str, fields: Value) {
    let rendered = serde_json::to_string(&fields).unwrap_or_else(|_| "{}".to_string());
    log_internal(
        LogTag::Audit,
        LogLevel::Warning,
        &format!("{} {}", event, rendered),
    );
}
