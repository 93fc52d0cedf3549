/// Resource classes cached by the middleware
///
/// TTLs are tuned per class:
/// - Prices: short TTL (quotes move constantly)
/// - Tickers: long TTL (instrument listings barely change)
/// - Analyses: medium TTL (expensive to recompute, moderately stable)
use crate::config::CacheSettings;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Prices,
    Tickers,
    Analyses,
}

impl ResourceClass {
    /// Key prefix, combined with an identifier into keys like `prices_AAPL`
    pub fn prefix(&self) -> &'static str {
        match self {
            ResourceClass::Prices => "prices",
            ResourceClass::Tickers => "tickers",
            ResourceClass::Analyses => "analyses",
        }
    }

    /// Build the cache key for an identifier within this class
    pub fn key(&self, ident: &str) -> String {
        format!("{}_{}", self.prefix(), ident)
    }

    /// Configured TTL for this class
    pub fn ttl(&self, settings: &CacheSettings) -> Duration {
        let secs = match self {
            ResourceClass::Prices => settings.prices_ttl_secs,
            ResourceClass::Tickers => settings.tickers_ttl_secs,
            ResourceClass::Analyses => settings.analyses_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}
