//! Group Counters
//!
//! Lock-free counters describing how a group's requests were served.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-group request counters
#[derive(Debug, Default)]
pub struct GroupStats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
    server_requests: AtomicU64,
}

impl GroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_error(&self) {
        self.local_load_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errors: self.local_load_errors.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GroupStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupStatsSnapshot {
    /// Non-empty-key lookups
    pub gets: u64,
    /// Lookups served from the local cache
    pub cache_hits: u64,
    /// Values fetched from the owning peer
    pub peer_loads: u64,
    /// Peer fetches that failed and fell back to the loader
    pub peer_errors: u64,
    /// Successful loader invocations
    pub local_loads: u64,
    /// Failed loader invocations
    pub local_load_errors: u64,
    /// Requests received over the peer protocol
    pub server_requests: u64,
}

impl GroupStatsSnapshot {
    /// Fraction of lookups served from the local cache
    pub fn hit_ratio(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.gets as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_hit_ratio() {
        let stats = GroupStats::new();
        assert_eq!(stats.snapshot().hit_ratio(), 0.0);

        stats.record_get();
        stats.record_get();
        stats.record_cache_hit();
        stats.record_peer_error();
        stats.record_local_load();

        let snap = stats.snapshot();
        assert_eq!(snap.gets, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.peer_errors, 1);
        assert_eq!(snap.local_loads, 1);
        assert_eq!(snap.hit_ratio(), 0.5);
    }
}
