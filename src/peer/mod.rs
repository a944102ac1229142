//! Peer Transport
//!
//! Nodes exchange cache entries over plain HTTP:
//!
//! ```text
//! GET <base-path><group>/<key>
//!   200  application/octet-stream  raw value bytes
//!   400  malformed path
//!   404  unknown group, or the value could not be loaded
//!   405  anything but GET
//! ```
//!
//! # Components
//!
//! - [`PeerPicker`] / [`PeerGetter`] - capability traits used by groups
//! - [`HttpPool`] - owns the hash ring and per-peer clients, and serves the
//!   protocol for the local node
//! - [`HttpGetter`] - client for a single remote peer

mod client;
mod pool;
mod server;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use client::HttpGetter;
pub use pool::{HttpPool, PoolConfig, DEFAULT_BASE_PATH, DEFAULT_REPLICAS};

/// Chooses the peer that owns a key
pub trait PeerPicker: Send + Sync {
    /// The owning remote peer, or `None` when the key belongs to this node
    /// or no peers are configured
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Fetches a value from one remote peer
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Fetch `key` from `group` on the remote node
    async fn get(&self, group: &str, key: &str) -> Result<Bytes>;
}
