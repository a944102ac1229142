//! Metrics Exposition
//!
//! Renders the counters of every group in a [`GroupRegistry`] in the
//! Prometheus text format. A fresh `prometheus::Registry` is filled from a
//! snapshot on each scrape, so nothing has to be kept in sync with the
//! groups themselves.

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::group::GroupRegistry;

const NAMESPACE: &str = "peercache";

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGaugeVec> {
    let gauge = IntGaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Encode all group counters. Returns the content type and the body.
pub fn encode_metrics(groups: &GroupRegistry) -> Result<(String, Vec<u8>)> {
    let registry = Registry::new();

    let gets = counter(&registry, "gets_total", "Non-empty-key lookups")?;
    let cache_hits = counter(&registry, "cache_hits_total", "Lookups served from the local cache")?;
    let peer_loads = counter(&registry, "peer_loads_total", "Values fetched from the owning peer")?;
    let peer_errors = counter(&registry, "peer_errors_total", "Failed peer fetches")?;
    let local_loads = counter(&registry, "local_loads_total", "Successful loader invocations")?;
    let local_load_errors = counter(&registry, "local_load_errors_total", "Failed loader invocations")?;
    let server_requests = counter(&registry, "server_requests_total", "Peer protocol requests served")?;
    let evictions = counter(&registry, "cache_evictions_total", "Entries evicted from the local cache")?;
    let cache_bytes = gauge(&registry, "cache_bytes", "Bytes held in the local cache")?;
    let cache_items = gauge(&registry, "cache_items", "Entries held in the local cache")?;

    for snapshot in groups.snapshot() {
        let labels = [snapshot.name.as_str()];
        let stats = snapshot.stats;

        gets.with_label_values(&labels).inc_by(stats.gets);
        cache_hits.with_label_values(&labels).inc_by(stats.cache_hits);
        peer_loads.with_label_values(&labels).inc_by(stats.peer_loads);
        peer_errors.with_label_values(&labels).inc_by(stats.peer_errors);
        local_loads.with_label_values(&labels).inc_by(stats.local_loads);
        local_load_errors
            .with_label_values(&labels)
            .inc_by(stats.local_load_errors);
        server_requests
            .with_label_values(&labels)
            .inc_by(stats.server_requests);
        evictions
            .with_label_values(&labels)
            .inc_by(snapshot.cache.evictions);
        cache_bytes
            .with_label_values(&labels)
            .set(snapshot.cache.bytes as i64);
        cache_items
            .with_label_values(&labels)
            .set(snapshot.cache.items as i64);
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;

    Ok((encoder.format_type().to_string(), buffer))
}
