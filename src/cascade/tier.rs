//! A single tier: one backend plus its expiration and key settings.

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::cascade::backend::Backend;
use crate::cascade::capability::{Capability, CapabilitySet};
use crate::cascade::expiration::{ExpirationMode, ExpirationPolicy};
use crate::cascade::keys::{CacheItem, KeyAdapter};

/// One link of a cascade.
///
/// Configured with consuming builder methods and then moved into a
/// [`ChainBuilder`](crate::cascade::chain::ChainBuilder); after that it is
/// read-only.
pub struct Tier<K, T> {
    name: String,
    backend: Box<dyn Backend<T>>,
    capabilities: CapabilitySet,
    expiration: ExpirationPolicy,
    keys: KeyAdapter<K, T>,
}

impl<K, T> fmt::Debug for Tier<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tier")
            .field("name", &self.name)
            .field("backend", &self.backend.kind())
            .field("capabilities", &self.capabilities)
            .field("expiration", &self.expiration)
            .field("keys", &self.keys)
            .finish()
    }
}

impl<K, T> Tier<K, T>
where
    K: fmt::Display,
    T: CacheItem,
{
    /// Create a tier with default keys and no expiration.
    pub fn new(name: impl Into<String>, backend: impl Backend<T> + 'static) -> Self {
        Self::from_boxed(name, Box::new(backend))
    }

    pub fn from_boxed(name: impl Into<String>, backend: Box<dyn Backend<T>>) -> Self {
        let capabilities = backend.capabilities();
        Self {
            name: name.into(),
            backend,
            capabilities,
            expiration: ExpirationPolicy::none(),
            keys: KeyAdapter::default(),
        }
    }
}

impl<K, T> Tier<K, T> {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiration.ttl = Some(ttl);
        self
    }

    pub fn with_absolute_expiration(mut self, at: SystemTime) -> Self {
        self.expiration.absolute = Some(at);
        self
    }

    pub fn with_expiration_mode(mut self, mode: ExpirationMode) -> Self {
        self.expiration.mode = mode;
        self
    }

    pub fn with_expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.expiration = policy;
        self
    }

    /// Declare an extra capability on top of the backend's own.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_key_fn(mut self, f: impl Fn(&K) -> String + Send + Sync + 'static) -> Self {
        self.keys.set_key_fn(f);
        self
    }

    pub fn with_item_key_fn(mut self, f: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.keys.set_item_key_fn(f);
        self
    }

    pub fn with_all_key(mut self, key: impl Into<String>) -> Self {
        self.keys.set_all_key(key);
        self
    }

    pub fn with_list_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys.set_list_key_prefix(prefix);
        self
    }

    pub fn with_list_key(mut self, key: impl Into<String>) -> Self {
        self.keys.set_list_key(key);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &dyn Backend<T> {
        self.backend.as_ref()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn expiration(&self) -> &ExpirationPolicy {
        &self.expiration
    }

    pub fn keys(&self) -> &KeyAdapter<K, T> {
        &self.keys
    }
}
