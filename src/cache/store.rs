/// Generic in-memory cache with per-entry TTL and LRU eviction
///
/// Thread-safe, generic over key/value types. Expiry is lazy (checked at
/// read time) with an explicit sweep for background cleanup. Tracks metrics
/// for monitoring.
use crate::clock::Clock;
use crate::errors::{MiddlewareError, MiddlewareResult};
use crate::logger::{self, LogTag};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache entry with TTL tracking
///
/// Entries are immutable once created: replacing a key replaces the whole
/// entry, resetting both timestamps.
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            created_at: now,
            ttl,
            last_accessed: now,
        }
    }

    /// An entry is expired exactly at its TTL boundary (`>=`, not `>`)
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub inserts: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL cache store with capacity-bounded LRU eviction
///
/// Different resource classes coexist in one store because the TTL is
/// carried per entry, not per store.
pub struct TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    capacity: usize,
    clock: Arc<dyn Clock>,
    data: RwLock<HashMap<K, CacheEntry<V>>>,
    access_order: RwLock<VecDeque<K>>, // For LRU tracking
    metrics: RwLock<CacheMetrics>,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Create a new cache with the given capacity and clock
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> MiddlewareResult<Self> {
        if capacity == 0 {
            return Err(MiddlewareError::Configuration(
                "cache capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            clock,
            data: RwLock::new(HashMap::new()),
            access_order: RwLock::new(VecDeque::new()),
            metrics: RwLock::new(CacheMetrics::default()),
        })
    }

    /// Get a live value from the cache
    ///
    /// Returns `None` on a miss. An expired entry is removed as a side
    /// effect; a miss is normal and silent, never an error.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut data = self.data.write();

        if let Some(entry) = data.get_mut(key) {
            if entry.is_expired(now) {
                data.remove(key);
                self.remove_from_access_order(key);

                let mut metrics = self.metrics.write();
                metrics.misses += 1;
                metrics.expirations += 1;

                return None;
            }

            // Valid entry: touch and return
            entry.touch(now);
            let value = entry.value.clone();
            self.update_access_order(key);

            let mut metrics = self.metrics.write();
            metrics.hits += 1;

            Some(value)
        } else {
            let mut metrics = self.metrics.write();
            metrics.misses += 1;
            None
        }
    }

    /// Insert or replace an entry, evicting the LRU entry at capacity
    ///
    /// Replacement is a full reset: `created_at` and `last_accessed` both
    /// move to now.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let now = self.clock.now();
        let mut data = self.data.write();

        if data.len() >= self.capacity && !data.contains_key(&key) {
            self.evict_lru(&mut data);
        }

        data.insert(key.clone(), CacheEntry::new(value, ttl, now));
        self.update_access_order(&key);

        let mut metrics = self.metrics.write();
        metrics.inserts += 1;
    }

    /// Remove an entry if present; silent no-op otherwise
    pub fn invalidate(&self, key: &K) {
        let mut data = self.data.write();
        data.remove(key);
        self.remove_from_access_order(key);
    }

    /// Sweep all entries, removing expired ones
    ///
    /// Intended for periodic background cleanup. Returns the number of
    /// entries removed.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut data = self.data.write();

        let expired: Vec<K> = data
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            data.remove(key);
        }

        let mut access_order = self.access_order.write();
        access_order.retain(|k| !expired.contains(k));
        drop(access_order);
        drop(data);

        let removed = expired.len();
        if removed > 0 {
            let mut metrics = self.metrics.write();
            metrics.expirations += removed as u64;
            logger::debug(
                LogTag::Cache,
                &format!("expired sweep removed {} entries", removed),
            );
        }
        removed
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.data.write().clear();
        self.access_order.write().clear();
    }

    /// Get current metrics
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.read().clone()
    }

    /// Current number of entries (live and not-yet-swept expired)
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Evict the least recently used entry. Caller holds the data lock.
    fn evict_lru(&self, data: &mut HashMap<K, CacheEntry<V>>) {
        let mut access_order = self.access_order.write();

        if let Some(lru_key) = access_order.pop_front() {
            data.remove(&lru_key);

            let mut metrics = self.metrics.write();
            metrics.evictions += 1;
            drop(metrics);

            logger::debug(
                LogTag::Cache,
                &format!("evicted least recently used entry (capacity {})", self.capacity),
            );
        }
    }

    // Move the key to the most-recently-used position
    fn update_access_order(&self, key: &K) {
        let mut access_order = self.access_order.write();
        access_order.retain(|k| k != key);
        access_order.push_back(key.clone());
    }

    fn remove_from_access_order(&self, key: &K) {
        let mut access_order = self.access_order.write();
        access_order.retain(|k| k != key);
    }
}
