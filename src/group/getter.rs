//! Loader Contract
//!
//! A [`Getter`] produces the authoritative bytes for a key when no cache and
//! no owning peer can serve it.

use async_trait::async_trait;

/// Source of truth consulted on a confirmed miss
#[async_trait]
pub trait Getter: Send + Sync {
    /// Load the raw bytes for `key`
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Adapter turning a plain function or closure into a [`Getter`]
///
/// ```ignore
/// let getter = GetterFn(|key: &str| -> anyhow::Result<Vec<u8>> { Ok(key.as_bytes().to_vec()) });
/// registry.new_group("echo", 1 << 20, getter)?;
/// ```
pub struct GetterFn<F>(pub F);

#[async_trait]
impl<F> Getter for GetterFn<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.0)(key)
    }
}

impl<F> std::fmt::Debug for GetterFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GetterFn")
    }
}
