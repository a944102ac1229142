//! LRU Engine
//!
//! Single-threaded, byte-bounded least-recently-used cache keyed by string.
//!
//! # Design
//!
//! - `hashlink::LinkedHashMap` keeps the recency order: front is the least
//!   recently used entry, back is the most recently used one
//! - get / add / evict are all O(1)
//! - An entry is charged `key.len() + value.byte_size()` bytes
//! - No locking here; see [`super::Cache`] for the thread-safe wrapper

use std::num::NonZeroU64;

use hashlink::LinkedHashMap;
use tracing::warn;

use super::byteview::ByteSize;

/// Callback invoked with every evicted entry. Errors are logged and dropped.
pub type OnEvicted<V> = Box<dyn FnMut(String, V) -> anyhow::Result<()> + Send>;

/// Byte-bounded LRU cache
pub struct LruCache<V> {
    /// Byte budget
    max_bytes: u64,
    /// Bytes currently charged, always <= max_bytes between calls
    used_bytes: u64,
    /// Entries in recency order
    entries: LinkedHashMap<String, V>,
    /// Optional eviction hook
    on_evicted: Option<OnEvicted<V>>,
}

impl<V: ByteSize> LruCache<V> {
    /// Create an empty cache with the given byte budget
    pub fn new(max_bytes: NonZeroU64) -> Self {
        Self {
            max_bytes: max_bytes.get(),
            used_bytes: 0,
            entries: LinkedHashMap::new(),
            on_evicted: None,
        }
    }

    /// Create an empty cache that reports evictions to `on_evicted`
    pub fn with_eviction_callback(max_bytes: NonZeroU64, on_evicted: OnEvicted<V>) -> Self {
        Self {
            on_evicted: Some(on_evicted),
            ..Self::new(max_bytes)
        }
    }

    /// Look up a key, marking it most recently used on a hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.entries.to_back(key).map(|value| &*value)
    }

    /// Insert or replace a value, then evict until the budget holds again
    pub fn add(&mut self, key: &str, value: V) {
        let new_size = value.byte_size() as u64;

        if let Some(slot) = self.entries.to_back(key) {
            let old_size = slot.byte_size() as u64;
            *slot = value;
            self.used_bytes = self.used_bytes + new_size - old_size;
        } else {
            self.used_bytes += key.len() as u64 + new_size;
            self.entries.insert(key.to_owned(), value);
        }

        while self.used_bytes > self.max_bytes {
            if !self.remove_oldest() {
                break;
            }
        }
    }

    /// Evict the least recently used entry. Returns false when empty.
    pub fn remove_oldest(&mut self) -> bool {
        let Some((key, value)) = self.entries.pop_front() else {
            return false;
        };

        self.used_bytes -= key.len() as u64 + value.byte_size() as u64;

        if let Some(on_evicted) = self.on_evicted.as_mut() {
            if let Err(e) = on_evicted(key, value) {
                warn!(error = %e, "eviction callback failed");
            }
        }
        true
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from least to most recently used, without touching recency
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Bytes currently charged against the budget
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Configured byte budget
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

impl<V> std::fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("entries", &self.entries.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
