//! HTTP Peer Pool
//!
//! Owns the consistent-hash ring together with one [`HttpGetter`] per peer.
//! Both are rebuilt from the full peer list on every [`HttpPool::set`] and
//! swapped under one lock, so a lookup never sees a half-updated peer set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use tracing::info;

use super::client::HttpGetter;
use super::{PeerGetter, PeerPicker};
use crate::error::{Error, Result};
use crate::group::GroupRegistry;
use crate::ring::HashRing;

/// Default URL prefix of the peer protocol
pub const DEFAULT_BASE_PATH: &str = "/mycache/";

/// Default number of virtual nodes per peer
pub const DEFAULT_REPLICAS: usize = 50;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an [`HttpPool`]
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Path prefix; must start and end with `/`
    pub base_path: String,

    /// Virtual nodes per peer on the hash ring
    pub replicas: usize,

    /// Deadline for a single peer request
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    fn validate(&self) -> Result<()> {
        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                self.base_path
            )));
        }
        if self.replicas == 0 {
            return Err(Error::Config("replicas must be positive".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Pool
// =============================================================================

/// Ring and per-peer clients, replaced together
struct PeerSet {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// Peer picker and protocol server for the local node
pub struct HttpPool {
    /// This node's own URL, e.g. `http://10.0.0.1:8001`
    self_url: String,
    config: PoolConfig,
    /// Groups served to other peers
    registry: Arc<GroupRegistry>,
    /// Shared by all per-peer getters
    client: Client,
    peers: Mutex<PeerSet>,
}

impl HttpPool {
    /// Create a pool with default configuration serving the global registry
    pub fn new(self_url: impl Into<String>) -> Result<Self> {
        Self::with_config(self_url, PoolConfig::default(), GroupRegistry::global())
    }

    /// Create a pool with custom configuration and registry
    pub fn with_config(
        self_url: impl Into<String>,
        config: PoolConfig,
        registry: Arc<GroupRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let peers = PeerSet {
            ring: HashRing::new(config.replicas),
            getters: HashMap::new(),
        };

        Ok(Self {
            self_url: self_url.into(),
            config,
            registry,
            client,
            peers: Mutex::new(peers),
        })
    }

    /// Replace the peer set. `peers` is the full list of node URLs,
    /// including this node.
    pub fn set<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers: Vec<String> = peers.into_iter().map(Into::into).collect();

        let mut ring = HashRing::new(self.config.replicas);
        ring.add(&peers);

        let getters = peers
            .iter()
            .map(|peer| {
                let base_url = format!("{}{}", peer, self.config.base_path);
                let getter = HttpGetter::new(base_url, self.client.clone());
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        *self.peers.lock() = PeerSet { ring, getters };
        info!(node = %self.self_url, peers = ?peers, "peer set updated");
    }

    /// Configured peer URLs, sorted
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers.lock().getters.keys().cloned().collect();
        peers.sort_unstable();
        peers
    }

    /// This node's URL
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    pub fn base_path(&self) -> &str {
        &self.config.base_path
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Registry whose groups this pool serves
    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let peers = self.peers.lock();

        let owner = peers.ring.get(key)?;
        if owner == self.self_url {
            return None;
        }

        info!(node = %self.self_url, peer = owner, "pick peer");
        let getter = peers.getters.get(owner)?;
        Some(Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("config", &self.config)
            .field("peers", &self.peers())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
