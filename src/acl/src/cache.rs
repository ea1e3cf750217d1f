//! TTL result cache with prefix eviction
//!
//! Provides:
//! - In-memory storage with DashMap (thread-safe, sharded)
//! - Uniform TTL per cache instance, checked lazily on read
//! - Prefix-based bulk eviction for per-user invalidation
//! - A [`CacheBackend`] contract so a distributed cache can stand in

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::Result;

/// Cache backend contract consumed by the service
#[async_trait]
pub trait CacheBackend<V>: Send + Sync {
    /// Get a live value; expired or missing keys yield `None`
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Store a value, overwriting any previous one and resetting its expiry
    async fn set(&self, key: &str, value: V) -> Result<()>;

    /// Remove every key starting with `prefix`, returning how many were removed
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Remove everything
    async fn clear(&self) -> Result<()>;
}

/// Cached entry with absolute expiry
#[derive(Clone)]
struct CachedEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V> CachedEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// In-memory TTL cache keyed by composite strings
pub struct ResultCache<V> {
    entries: Arc<DashMap<String, CachedEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    expirations: AtomicUsize,
}

impl<V: Clone + Send + Sync> ResultCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            clock,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expirations: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a cached value, evicting it if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired(now) {
                drop(entry);
                self.entries.remove(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.value.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value with a fresh expiry of now + TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.entries.insert(key.into(), CachedEntry { value, expires_at });
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every key that starts with `prefix`
    pub fn delete_by_prefix(&self, prefix: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = !key.starts_with(prefix);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> CacheBackend<V> for ResultCache<V> {
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(ResultCache::get(self, key))
    }

    async fn set(&self, key: &str, value: V) -> Result<()> {
        ResultCache::set(self, key, value);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        Ok(ResultCache::delete_by_prefix(self, prefix))
    }

    async fn clear(&self) -> Result<()> {
        ResultCache::clear(self);
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
