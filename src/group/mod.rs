//! Cache Groups
//!
//! A [`Group`] is one cache namespace: a name, a loader, a local cache and an
//! optional peer picker.
//!
//! # Lookup Flow
//!
//! ```text
//!                        hit
//! get(key) ──▶ local cache ────────────────────────────▶ value
//!                  │ miss
//!                  ▼           remote owner    ok
//!             pick_peer(key) ───────────────▶ peer GET ──▶ value (not cached)
//!                  │ none / self                 │ error
//!                  ▼                             │
//!               loader ◀─────────────────────────┘
//!                  │ ok
//!                  ▼
//!         populate local cache ──▶ value
//! ```
//!
//! Concurrent misses for the same key are not merged: every caller runs its
//! own peer fetch or loader call.

mod getter;
mod registry;
mod stats;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::cache::{ByteView, Cache, CacheStats};
use crate::error::{Error, Result};
use crate::peer::{PeerGetter, PeerPicker};

pub use getter::{Getter, GetterFn};
pub use registry::{get_group, new_group, GroupRegistry, GroupSnapshot};
pub use stats::{GroupStats, GroupStatsSnapshot};

/// A named cache namespace
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: Cache,
    /// Set at most once
    peers: OnceCell<Arc<dyn PeerPicker>>,
    stats: GroupStats,
}

impl Group {
    pub(crate) fn new(name: String, cache_bytes: u64, getter: Arc<dyn Getter>) -> Result<Self> {
        Ok(Self {
            name,
            getter,
            main_cache: Cache::new(cache_bytes)?,
            peers: OnceCell::new(),
            stats: GroupStats::new(),
        })
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the value for `key`, loading it from the owning peer or the loader
    /// on a miss
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        self.stats.record_get();

        if let Some(value) = self.main_cache.get(key) {
            debug!(group = %self.name, key, "cache hit");
            self.stats.record_cache_hit();
            return Ok(value);
        }

        self.load(key).await
    }

    /// Like [`Group::get`], but gives up with [`Error::Cancelled`] as soon as
    /// `token` is cancelled. Any in-flight peer or loader call is dropped.
    pub async fn get_cancellable(&self, key: &str, token: &CancellationToken) -> Result<ByteView> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            result = self.get(key) => result,
        }
    }

    /// Attach the peer picker used to route misses. Can only be done once.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers.set(peers).map_err(|_| {
            Error::Config(format!(
                "peers already registered for group {}",
                self.name
            ))
        })
    }

    /// Store a value in the local cache
    pub fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.add(key, value);
    }

    /// Request counters
    pub fn stats(&self) -> GroupStatsSnapshot {
        self.stats.snapshot()
    }

    /// Local cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.main_cache.stats()
    }

    pub(crate) fn record_server_request(&self) {
        self.stats.record_server_request();
    }

    #[instrument(skip(self), fields(group = %self.name))]
    async fn load(&self, key: &str) -> Result<ByteView> {
        if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
            match self.get_from_peer(peer.as_ref(), key).await {
                Ok(value) => {
                    self.stats.record_peer_load();
                    return Ok(value);
                }
                Err(e) => {
                    self.stats.record_peer_error();
                    warn!(error = %e, "failed to get from peer, loading locally");
                }
            }
        }

        self.get_locally(key).await
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self.getter.get(key).await.map_err(|e| {
            self.stats.record_local_load_error();
            Error::Loader(e)
        })?;
        self.stats.record_local_load();

        // the loader handed us its buffer; nobody else holds it
        let value = ByteView::from(bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bytes = peer.get(&self.name, key).await?;
        Ok(ByteView::from(bytes))
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache", &self.main_cache)
            .field("has_peers", &self.peers.get().is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
