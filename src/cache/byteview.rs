//! Immutable Cache Values
//!
//! `ByteView` is the unit of value stored in a group cache and sent over the
//! peer protocol. The backing buffer is never mutated after construction;
//! callers receive either a copy or a cheap reference-counted clone.

use bytes::Bytes;

/// Values that can report how many bytes they occupy in the cache
pub trait ByteSize {
    /// Size in bytes charged against the cache budget
    fn byte_size(&self) -> usize;
}

impl ByteSize for Bytes {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for String {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

/// Read-only view over a cached value
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Build a view that owns a private copy of `data`
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy of the underlying bytes; mutating it never affects the cache
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Zero-copy immutable handle to the underlying bytes
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl ByteSize for ByteView {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for ByteView {
    /// Takes ownership of the buffer; nobody else can reach it afterwards
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<Bytes> for ByteView {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::copy_from_slice(s.as_bytes())
    }
}

impl std::fmt::Display for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.data))
    }
}

impl std::fmt::Debug for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteView").field("len", &self.len()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
