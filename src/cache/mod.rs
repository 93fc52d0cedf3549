/// TTL cache store with LRU eviction
///
/// The store itself is policy-free: TTLs are decided per entry by the
/// caller, usually through a [`ResourceClass`] preset.

mod config;
mod store;

pub use config::ResourceClass;
pub use store::{CacheMetrics, TtlCache};
