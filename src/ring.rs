//! Consistent-Hash Ring
//!
//! Maps keys to peer names. Every peer is placed on the ring `replicas` times
//! (virtual nodes) so that load spreads evenly and a membership change only
//! remaps the keys owned by the peers that changed.
//!
//! The ring has no single-peer removal; callers rebuild it from the full peer
//! list whenever membership changes.

use std::collections::HashMap;

/// Hash function used for both virtual nodes and keys
pub type HashFn = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Consistent-hash ring of named peers
pub struct HashRing {
    hash: HashFn,
    /// Virtual nodes per peer
    replicas: usize,
    /// Virtual node hashes, sorted ascending
    ring: Vec<u32>,
    /// Virtual node hash -> real peer name
    owners: HashMap<u32, String>,
}

impl HashRing {
    /// Create an empty ring hashing with CRC-32 (IEEE)
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, Box::new(crc32fast::hash))
    }

    /// Create an empty ring with a custom hash function
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            ring: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Place peers on the ring. Virtual node `i` of peer `name` sits at
    /// `hash(format!("{i}{name}"))`.
    pub fn add<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", i, name).as_bytes());
                self.ring.push(hash);
                self.owners.insert(hash, name.to_string());
            }
        }
        self.ring.sort_unstable();
    }

    /// Owner of `key`: the first virtual node clockwise from the key's hash,
    /// wrapping to the start of the ring. `None` when the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.ring.partition_point(|&h| h < hash);
        let vnode = self.ring[idx % self.ring.len()];
        self.owners.get(&vnode).map(String::as_str)
    }

    /// Number of virtual nodes on the ring
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.ring.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
