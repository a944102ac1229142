//! peercache - Distributed In-Memory Read-Through Cache
//!
//! A group of cooperating nodes shares one logical cache. Every key has an
//! owning node chosen by a consistent-hash ring; other nodes fetch the value
//! from the owner over HTTP and the owner loads it from the source of truth
//! through a caller-supplied loader.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          peercache                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │    Group     │──▶│   HttpPool   │──▶│   HttpGetter     │  │
//! │  │ (namespace)  │   │ (ring+server)│   │ (remote peer)    │  │
//! │  └──────┬───────┘   └──────────────┘   └──────────────────┘  │
//! │         │                                                    │
//! │  ┌──────▼───────┐   ┌──────────────┐                          │
//! │  │    Cache     │──▶│   LruCache   │                          │
//! │  │  (mutex)     │   │ (byte bound) │                          │
//! │  └──────────────┘   └──────────────┘                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Byte-bounded LRU engine and its thread-safe wrapper
//! - [`ring`] - Consistent-hash ring with virtual nodes
//! - [`group`] - Namespaces, loaders and the group registry
//! - [`peer`] - HTTP peer picker, client and server
//! - [`monitoring`] - Prometheus text exposition of group counters
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```no_run
//! use peercache::{new_group, GetterFn};
//!
//! # async fn run() -> peercache::Result<()> {
//! let group = new_group(
//!     "scores",
//!     2 << 10,
//!     GetterFn(|key: &str| -> anyhow::Result<Vec<u8>> {
//!         match key {
//!             "Tom" => Ok(b"630".to_vec()),
//!             _ => Err(anyhow::anyhow!("{} not exist", key)),
//!         }
//!     }),
//! )?;
//!
//! let value = group.get("Tom").await?;
//! assert_eq!(value.to_string(), "630");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod group;
pub mod monitoring;
pub mod peer;
pub mod ring;

// Re-export commonly used types
pub use cache::{ByteSize, ByteView, Cache, CacheStats, LruCache};
pub use error::{Error, Result};
pub use group::{get_group, new_group, Getter, GetterFn, Group, GroupRegistry};
pub use peer::{HttpGetter, HttpPool, PeerGetter, PeerPicker, PoolConfig};
pub use ring::HashRing;
