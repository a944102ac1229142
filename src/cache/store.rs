//! Concurrency-safe Cache
//!
//! Wraps one [`LruCache`] behind a single mutex. The engine is only allocated
//! on the first `add`, so a `get` on a fresh cache is a plain miss.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::byteview::ByteView;
use super::lru::LruCache;
use crate::error::{Error, Result};

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Bytes charged against the budget
    pub bytes: u64,
    /// Number of entries
    pub items: u64,
    /// Lookups served
    pub gets: u64,
    /// Lookups that found a value
    pub hits: u64,
    /// Entries evicted to stay within budget
    pub evictions: u64,
}

/// Thread-safe, lazily initialised byte-bounded cache of [`ByteView`]s
pub struct Cache {
    /// Budget handed to the engine on first use
    cache_bytes: NonZeroU64,
    /// `None` until the first add
    lru: Mutex<Option<LruCache<ByteView>>>,
    gets: AtomicU64,
    hits: AtomicU64,
    evictions: Arc<AtomicU64>,
}

impl Cache {
    /// Create a cache with the given byte budget; zero is rejected
    pub fn new(cache_bytes: u64) -> Result<Self> {
        let cache_bytes = NonZeroU64::new(cache_bytes)
            .ok_or_else(|| Error::Config("cache byte budget must be positive".to_string()))?;

        Ok(Self {
            cache_bytes,
            lru: Mutex::new(None),
            gets: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            evictions: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Insert or replace a value
    pub fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.lru.lock();
        let lru = guard.get_or_insert_with(|| {
            let evictions = Arc::clone(&self.evictions);
            LruCache::with_eviction_callback(
                self.cache_bytes,
                Box::new(move |_key, _value| {
                    evictions.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }),
            )
        });
        lru.add(key, value);
    }

    /// Look up a value, promoting it on a hit
    pub fn get(&self, key: &str) -> Option<ByteView> {
        self.gets.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.lru.lock();
        let value = guard.as_mut()?.get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Whether the engine has been allocated yet
    pub fn is_initialized(&self) -> bool {
        self.lru.lock().is_some()
    }

    /// Configured byte budget
    pub fn capacity(&self) -> u64 {
        self.cache_bytes.get()
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> CacheStats {
        let (bytes, items) = match self.lru.lock().as_ref() {
            Some(lru) => (lru.used_bytes(), lru.len() as u64),
            None => (0, 0),
        };

        CacheStats {
            bytes,
            items,
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("cache_bytes", &self.cache_bytes)
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
