//! Key adaptation layer.
//!
//! Every tier maps logical keys to the physical keys its store uses. The
//! defaults namespace collections by [`CacheItem::TYPE_NAME`].

use std::fmt;
use std::sync::Arc;

use crate::error::{CascadeError, Result};

/// A value that can be stored in a cascade.
pub trait CacheItem: Clone + Send + Sync + 'static {
    /// Stable name used to derive default get-all and list keys.
    const TYPE_NAME: &'static str;
}

/// Logical key → physical key.
pub type KeyFn<K> = Arc<dyn Fn(&K) -> String + Send + Sync>;

/// Item → physical field key.
pub type ItemKeyFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Per-tier key mapping functions.
pub struct KeyAdapter<K, T> {
    key_fn: KeyFn<K>,
    item_key_fn: Option<ItemKeyFn<T>>,
    all_key: String,
    list_key_prefix: String,
    list_key: Option<String>,
}

impl<K, T> Clone for KeyAdapter<K, T> {
    fn clone(&self) -> Self {
        Self {
            key_fn: Arc::clone(&self.key_fn),
            item_key_fn: self.item_key_fn.clone(),
            all_key: self.all_key.clone(),
            list_key_prefix: self.list_key_prefix.clone(),
            list_key: self.list_key.clone(),
        }
    }
}

impl<K, T> fmt::Debug for KeyAdapter<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAdapter")
            .field("item_key_fn", &self.item_key_fn.is_some())
            .field("all_key", &self.all_key)
            .field("list_key_prefix", &self.list_key_prefix)
            .field("list_key", &self.list_key)
            .finish_non_exhaustive()
    }
}

impl<K, T> Default for KeyAdapter<K, T>
where
    K: fmt::Display,
    T: CacheItem,
{
    fn default() -> Self {
        Self {
            key_fn: Arc::new(|key: &K| key.to_string()),
            item_key_fn: None,
            all_key: T::TYPE_NAME.to_string(),
            list_key_prefix: T::TYPE_NAME.to_string(),
            list_key: None,
        }
    }
}

impl<K, T> KeyAdapter<K, T> {
    pub fn set_key_fn(&mut self, f: impl Fn(&K) -> String + Send + Sync + 'static) {
        self.key_fn = Arc::new(f);
    }

    pub fn set_item_key_fn(&mut self, f: impl Fn(&T) -> String + Send + Sync + 'static) {
        self.item_key_fn = Some(Arc::new(f));
    }

    pub fn set_all_key(&mut self, key: impl Into<String>) {
        self.all_key = key.into();
    }

    pub fn set_list_key_prefix(&mut self, prefix: impl Into<String>) {
        self.list_key_prefix = prefix.into();
    }

    /// Fixed list key. Once set, the list identifier is ignored.
    pub fn set_list_key(&mut self, key: impl Into<String>) {
        self.list_key = Some(key.into());
    }

    pub fn physical_key(&self, key: &K) -> String {
        (self.key_fn)(key)
    }

    pub fn all_key(&self) -> &str {
        &self.all_key
    }

    pub fn list_key(&self, list_id: &str) -> String {
        match &self.list_key {
            Some(fixed) => fixed.clone(),
            None => format!("{}:{}", self.list_key_prefix, list_id),
        }
    }

    /// Item-key view handed to backends during bulk writes.
    pub fn item_keys<'a>(&'a self, tier: &'a str) -> ItemKeys<'a, T> {
        ItemKeys {
            tier,
            item_key_fn: self.item_key_fn.as_ref(),
        }
    }
}

/// Derives per-item keys for a bulk write. Fails when the tier never had an
/// item-to-key function configured.
pub struct ItemKeys<'a, T> {
    tier: &'a str,
    item_key_fn: Option<&'a ItemKeyFn<T>>,
}

impl<'a, T> ItemKeys<'a, T> {
    /// Keys for a tier without an item-to-key function.
    pub fn unconfigured(tier: &'a str) -> Self {
        Self {
            tier,
            item_key_fn: None,
        }
    }

    pub fn key_of(&self, item: &T) -> Result<String> {
        match self.item_key_fn {
            Some(f) => Ok(f(item)),
            None => Err(CascadeError::ItemKeyNotConfigured {
                tier: self.tier.to_string(),
            }),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.item_key_fn.is_some()
    }
}
