//! Bounded, time-limited metadata cache for resolved remote sources.
//!
//! Entries expire after a fixed TTL and the oldest insertion is evicted once
//! the cache is full. Reads never change eviction order, so "least recently
//! used" degenerates to "oldest inserted"; re-inserting a key refreshes it.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl CacheStats {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            size: None,
            max_size: None,
            ttl_seconds: None,
        }
    }
}

/// TTL cache keyed by video identifier.
pub struct MetadataCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
    capacity: NonZeroUsize,
}

impl<V: Clone> MetadataCache<V> {
    /// Create a cache holding at most `max_entries` items for `ttl` each.
    ///
    /// A zero capacity is bumped to one.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a live entry, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.peek(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.inserted_at) >= self.ttl,
        };
        if expired {
            debug!("Cache entry for {key} expired");
            entries.pop(key);
            return None;
        }
        entries.peek(key).map(|entry| entry.value.clone())
    }

    /// Insert or refresh an entry. Returns the key evicted to make room, if any.
    pub fn insert(&self, key: impl Into<String>, value: V) -> Option<String> {
        let key = key.into();
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        let mut entries = self.lock();
        match entries.push(key.clone(), entry) {
            Some((evicted, _)) if evicted != key => {
                debug!("Evicted oldest cache entry {evicted}");
                Some(evicted)
            }
            _ => None,
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: true,
            size: Some(self.len()),
            max_size: Some(self.capacity.get()),
            ttl_seconds: Some(self.ttl.as_secs()),
        }
    }
}
