//! In-process backend.
//!
//! Single items and collections live in two maps behind tokio `RwLock`s.
//! Expired entries are dropped the first time they are read; sliding entries
//! get their deadline pushed out on every hit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cascade::backend::Backend;
use crate::cascade::capability::{Capability, CapabilitySet};
use crate::cascade::expiration::Expiry;
use crate::cascade::keys::ItemKeys;
use crate::error::Result;

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    expiry: Expiry,
}

#[derive(Debug)]
struct Inner<T> {
    items: RwLock<HashMap<String, Slot<T>>>,
    collections: RwLock<HashMap<String, Slot<Vec<T>>>>,
}

/// In-memory tier storage. Clones share the same maps.
#[derive(Debug)]
pub struct InMemoryBackend<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for InMemoryBackend<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for InMemoryBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryBackend<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                items: RwLock::new(HashMap::new()),
                collections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Number of live single-item entries (expired ones included until read).
    pub async fn len(&self) -> usize {
        self.inner.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut items = self.inner.items.write().await;
        let before = items.len();
        items.retain(|_, slot| !slot.expiry.is_expired(now));
        removed += before - items.len();
        drop(items);

        let mut collections = self.inner.collections.write().await;
        let before = collections.len();
        collections.retain(|_, slot| !slot.expiry.is_expired(now));
        removed += before - collections.len();

        removed
    }

    /// Expiry recorded for a single item, if present.
    pub async fn expiry_of(&self, key: &str) -> Option<Expiry> {
        self.inner.items.read().await.get(key).map(|s| s.expiry)
    }
}

/// Look up `key`, dropping it if expired and sliding it forward on a hit.
fn take_live<V: Clone>(map: &mut HashMap<String, Slot<V>>, key: &str, now: SystemTime) -> Option<V> {
    let slot = map.get_mut(key)?;
    if slot.expiry.is_expired(now) {
        map.remove(key);
        return None;
    }
    slot.expiry = slot.expiry.touched(now);
    Some(slot.value.clone())
}

#[async_trait]
impl<T> Backend<T> for InMemoryBackend<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> CapabilitySet {
        Capability::InProcess.into()
    }

    async fn get_one(&self, key: &str) -> Result<Option<T>> {
        let mut items = self.inner.items.write().await;
        Ok(take_live(&mut items, key, SystemTime::now()))
    }

    async fn get_all(&self, key: &str) -> Result<Vec<T>> {
        let mut collections = self.inner.collections.write().await;
        Ok(take_live(&mut collections, key, SystemTime::now()).unwrap_or_default())
    }

    async fn get_list(&self, key: &str) -> Result<Vec<T>> {
        self.get_all(key).await
    }

    async fn set_one(&self, key: &str, item: &T, expiry: Expiry) -> Result<()> {
        self.inner.items.write().await.insert(
            key.to_string(),
            Slot {
                value: item.clone(),
                expiry,
            },
        );
        Ok(())
    }

    async fn set_all(
        &self,
        key: &str,
        items: &[T],
        _item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()> {
        self.inner.collections.write().await.insert(
            key.to_string(),
            Slot {
                value: items.to_vec(),
                expiry,
            },
        );
        Ok(())
    }

    async fn set_list(
        &self,
        key: &str,
        items: &[T],
        item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()> {
        self.set_all(key, items, item_keys, expiry).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.items.write().await.remove(key);
        self.inner.collections.write().await.remove(key);
        Ok(())
    }
}
