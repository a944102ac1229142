//! Local Cache Storage
//!
//! Byte-bounded LRU storage that backs every group.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Cache (one per group)                        │
//! │   Mutex ── lazily built on first add         │
//! │     └── LruCache<ByteView>                   │
//! │           LinkedHashMap<String, ByteView>    │
//! │           front = LRU, back = MRU            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The engine itself is single-threaded; all synchronisation lives in
//! [`Cache`]. The lock is held only for the duration of one add or get and
//! never across loader or network calls.

mod byteview;
mod lru;
mod proptest;
mod store;

pub use byteview::{ByteSize, ByteView};
pub use lru::{LruCache, OnEvicted};
pub use store::{Cache, CacheStats};
