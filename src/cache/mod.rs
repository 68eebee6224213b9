//! Bounded in-memory cache.
//!
//! [`BoundedCache`] bounds both the number of entries and their cumulative
//! cost, and layers an optional per-entry TTL on top. When either bound would
//! be exceeded the least recently used entries are evicted first. An entry
//! whose cost alone exceeds the cost bound is rejected.
//!
//! The cache is typed per value shape: callers hold one instance per logical
//! key-space instead of casting opaque values back out.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::error::{CacheError, CacheResult};

/// Cost charged when a value cannot be serialized to estimate its size.
const FALLBACK_COST: u64 = 1;

struct Entry<V> {
    value: V,
    cost: u64,
    expires_at: Option<Instant>,
    last_used: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

struct CacheInner<V> {
    entries: HashMap<String, Entry<V>>,
    total_cost: u64,
    /// Monotonic access counter used for LRU ordering.
    clock: u64,
}

impl<V> CacheInner<V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.total_cost -= entry.cost;
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.remove(&key);
        }
    }

    fn evict_lru(&mut self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());

        match oldest {
            Some(key) => {
                debug!(key = %key, "Evicting least recently used cache entry");
                self.remove(&key);
                true
            }
            None => false,
        }
    }
}

/// Capacity- and cost-bounded key/value cache with per-entry expiry.
///
/// Safe for concurrent use; all bookkeeping happens under one short-lived
/// lock that is never held across I/O.
pub struct BoundedCache<V> {
    inner: Mutex<CacheInner<V>>,
    max_items: usize,
    max_cost: u64,
}

impl<V> BoundedCache<V>
where
    V: Clone + Serialize,
{
    /// Create a cache holding at most `max_items` entries and `max_cost` total cost.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidBounds`] when either bound is zero.
    pub fn new(max_items: usize, max_cost: u64) -> CacheResult<Self> {
        if max_items == 0 || max_cost == 0 {
            return Err(CacheError::InvalidBounds {
                max_items,
                max_cost,
            });
        }

        Ok(Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                total_cost: 0,
                clock: 0,
            }),
            max_items,
            max_cost,
        })
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry. Missing, expired and evicted keys all return `None`.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();

        if inner.entries.get(key)?.is_expired(now) {
            inner.remove(key);
            return None;
        }

        let tick = inner.tick();
        let entry = inner.entries.get_mut(key)?;
        entry.last_used = tick;
        Some(entry.value.clone())
    }

    /// Insert without expiry. See [`BoundedCache::set_with_ttl`].
    pub fn set(&self, key: impl Into<String>, value: V, cost: u64) -> bool {
        self.set_with_ttl(key, value, cost, Duration::ZERO)
    }

    /// Insert or overwrite `key`, expiring after `ttl` (a zero TTL never expires).
    ///
    /// A `cost` of zero is replaced by the value's serialized JSON length.
    /// Returns `false` when the entry is rejected because its cost alone
    /// exceeds the cache's cost bound; any previous value under `key` is
    /// dropped in that case.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, cost: u64, ttl: Duration) -> bool {
        let key = key.into();
        let cost = if cost == 0 {
            estimate_cost(&value)
        } else {
            cost
        };
        let now = Instant::now();

        let mut inner = self.lock();
        inner.remove(&key);

        if cost > self.max_cost {
            debug!(key = %key, cost, max_cost = self.max_cost, "Rejecting oversized cache entry");
            return false;
        }

        inner.purge_expired(now);
        while inner.entries.len() >= self.max_items || inner.total_cost + cost > self.max_cost {
            if !inner.evict_lru() {
                break;
            }
        }

        let last_used = inner.tick();
        inner.total_cost += cost;
        inner.entries.insert(
            key,
            Entry {
                value,
                cost,
                expires_at: (!ttl.is_zero()).then(|| now + ttl),
                last_used,
            },
        );
        true
    }

    /// Remove `key`, returning its value when it was live.
    pub fn remove(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let entry = inner.remove(key)?;
        (!entry.is_expired(Instant::now())).then_some(entry.value)
    }

    /// Whether `key` holds a live entry. Does not touch LRU order.
    pub fn contains(&self, key: &str) -> bool {
        let inner = self.lock();
        let now = Instant::now();
        inner
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.total_cost = 0;
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cumulative cost of stored entries.
    pub fn total_cost(&self) -> u64 {
        self.lock().total_cost
    }

    /// Configured cost bound.
    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }

    /// Configured entry bound.
    pub fn max_items(&self) -> usize {
        self.max_items
    }
}

/// Serialized JSON length of `value`, or a minimal cost if it cannot be serialized.
pub fn estimate_cost<V: Serialize>(value: &V) -> u64 {
    match serde_json::to_vec(value) {
        Ok(bytes) => (bytes.len() as u64).max(FALLBACK_COST),
        Err(_) => FALLBACK_COST,
    }
}
