//! Key/value store with per-entry time-to-live.
//!
//! This module provides:
//! - Deterministic key generation from a namespace and a parameter object
//! - Lazy expiry on access plus an opportunistic sweep on writes
//! - Memoization of fallible asynchronous producers via [`ExpiringCache::cached_call`]
//! - Hit/miss statistics
//!
//! The cache owns no global state. Construct one per component (or share a
//! single instance deliberately) and drop it to release everything.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;

/// Builds a cache key from a namespace and a parameter object.
///
/// Object fields are sorted (recursively) before hashing, so parameter sets
/// that differ only in insertion order map to the same key.
pub fn cache_key(namespace: &str, params: &Value) -> String {
    let canonical = canonicalize(params).to_string();
    format!("{}:{}", namespace, blake3::hash(canonical.as_bytes()).to_hex())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// A value returned by [`ExpiringCache::cached_call`], tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub from_cache: bool,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    /// Percentage of lookups served from cache, rounded to two decimals
    pub hit_rate: f64,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct ExpiringCache<V> {
    entries: HashMap<String, Entry<V>>,
    default_ttl: Duration,
    min_sweep_interval: Duration,
    last_sweep: Option<Instant>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> ExpiringCache<V> {
    /// Creates a cache with the given default TTL that sweeps on every write.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            min_sweep_interval: Duration::ZERO,
            last_sweep: None,
            hits: 0,
            misses: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(config.default_ttl());
        cache.set_min_sweep_interval(config.min_sweep_interval());
        cache
    }

    /// Sets a minimum interval between opportunistic sweeps.
    pub fn set_min_sweep_interval(&mut self, interval: Duration) {
        self.min_sweep_interval = interval;
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the live value for `key`, evicting it if it has expired.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                self.hits += 1;
                debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.misses += 1;
                debug!(key, "cache entry expired");
                None
            }
            None => {
                self.misses += 1;
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Stores `value` until `now + ttl` (the default TTL when `None`).
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let key = key.into();
        debug!(key = %key, ttl_secs = ttl.as_secs_f64(), "cache set");

        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
            },
        );

        if self.should_sweep(now) {
            self.sweep_at(now);
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes every key generated under `namespace` by [`cache_key`].
    pub fn invalidate_namespace(&mut self, namespace: &str) -> usize {
        let prefix = format!("{}:", namespace);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        let removed = before - self.entries.len();
        debug!(namespace, removed, "namespace invalidated");
        removed
    }

    /// Evicts every expired entry now, returning how many were removed.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn contains_live(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries.get(key).is_some_and(|entry| entry.is_live(now))
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 {
            (self.hits as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            total,
            hit_rate,
        }
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    /// Returns the cached value for `key`, or awaits `operation` and caches
    /// its output.
    ///
    /// A producer error is returned unchanged and nothing is stored, so the
    /// next call with the same key invokes the producer again. The cache
    /// cannot cancel or time out the producer.
    pub async fn cached_call<F, Fut, E>(
        &mut self,
        key: &str,
        operation: F,
        ttl: Option<Duration>,
    ) -> Result<Cached<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(Cached {
                value,
                from_cache: true,
            });
        }

        let value = operation().await?;
        self.set(key, value.clone(), ttl);

        Ok(Cached {
            value,
            from_cache: false,
        })
    }

    fn should_sweep(&self, now: Instant) -> bool {
        match self.last_sweep {
            None => true,
            Some(last) => now.duration_since(last) >= self.min_sweep_interval,
        }
    }

    fn sweep_at(&mut self, now: Instant) -> usize {
        self.last_sweep = Some(now);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }
}
