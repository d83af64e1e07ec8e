//! The contract every storage backend implements.
//!
//! A backend knows nothing about the chain: it receives physical keys and a
//! precomputed [`Expiry`] and talks to exactly one store.

use async_trait::async_trait;

use crate::cascade::capability::CapabilitySet;
use crate::cascade::expiration::Expiry;
use crate::cascade::keys::ItemKeys;
use crate::error::Result;

/// Storage primitives used by the dispatch engine.
///
/// Reads return `Ok(None)` / an empty vector on a miss; errors are reserved
/// for store failures and misconfiguration. Expired entries must read as
/// misses.
#[async_trait]
pub trait Backend<T>: Send + Sync {
    /// Short backend kind, used in logs.
    fn kind(&self) -> &'static str;

    /// Capabilities this backend provides.
    fn capabilities(&self) -> CapabilitySet;

    async fn get_one(&self, key: &str) -> Result<Option<T>>;

    async fn get_all(&self, key: &str) -> Result<Vec<T>>;

    async fn get_list(&self, key: &str) -> Result<Vec<T>>;

    async fn set_one(&self, key: &str, item: &T, expiry: Expiry) -> Result<()>;

    async fn set_all(
        &self,
        key: &str,
        items: &[T],
        item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()>;

    async fn set_list(
        &self,
        key: &str,
        items: &[T],
        item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}
