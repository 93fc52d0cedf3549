/// Log tags identifying which middleware component emitted a message
///
/// Tags keep log output scannable and allow per-component filtering.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    Cache,
    RateLimit,
    Retry,
    Batch,
    Config,
    Audit,
}

impl LogTag {
    /// Fixed-width display name used in the log prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Cache => "CACHE",
            LogTag::RateLimit => "RATELIMIT",
            LogTag::Retry => "RETRY",
            LogTag::Batch => "BATCH",
            LogTag::Config => "CONFIG",
            LogTag::Audit => "AUDIT",
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
