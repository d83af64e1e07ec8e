//! Dispatch engine: the cascade itself.
//!
//! Reads walk from the starting tier toward the tail until one tier has the
//! value, then back-fill the tiers they passed on the way. Writes and deletes
//! hit the starting tier and only continue toward the tail when asked to.
//!
//! The walk is iterative. Back-fill runs from the tier closest to the source
//! back to the starting tier, which is the order a recursive
//! "ask next, then store locally" implementation would produce.

use std::borrow::Borrow;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::debug;

use crate::cascade::chain::{Chain, TierRef};
use crate::cascade::expiration::Expiry;
use crate::cascade::keys::CacheItem;
use crate::cascade::options::CallOptions;
use crate::cascade::tier::Tier;
use crate::error::Result;
use crate::metrics::{LookupOutcome, WriteReason};

/// One family of read/write primitives (single item, get-all, list).
#[async_trait]
trait Access<K, T>: Sync {
    /// What a write consumes.
    type Value: ?Sized + Sync;
    /// What a read produces.
    type Owned: Borrow<Self::Value> + Send + Sync;

    fn physical_key(&self, tier: &Tier<K, T>) -> String;

    /// `None` when the tier has nothing (an empty collection counts as nothing).
    async fn read(&self, tier: &Tier<K, T>) -> Result<Option<Self::Owned>>;

    async fn write(&self, tier: &Tier<K, T>, value: &Self::Value, expiry: Expiry) -> Result<()>;
}

struct One<'k, K> {
    key: &'k K,
}

struct All;

struct List<'l> {
    id: &'l str,
}

#[async_trait]
impl<'k, K, T> Access<K, T> for One<'k, K>
where
    K: Sync,
    T: CacheItem,
{
    type Value = T;
    type Owned = T;

    fn physical_key(&self, tier: &Tier<K, T>) -> String {
        tier.keys().physical_key(self.key)
    }

    async fn read(&self, tier: &Tier<K, T>) -> Result<Option<T>> {
        let key = tier.keys().physical_key(self.key);
        tier.backend().get_one(&key).await
    }

    async fn write(&self, tier: &Tier<K, T>, value: &T, expiry: Expiry) -> Result<()> {
        let key = tier.keys().physical_key(self.key);
        tier.backend().set_one(&key, value, expiry).await
    }
}

#[async_trait]
impl<K, T> Access<K, T> for All
where
    K: Sync,
    T: CacheItem,
{
    type Value = [T];
    type Owned = Vec<T>;

    fn physical_key(&self, tier: &Tier<K, T>) -> String {
        tier.keys().all_key().to_string()
    }

    async fn read(&self, tier: &Tier<K, T>) -> Result<Option<Vec<T>>> {
        let items = tier.backend().get_all(tier.keys().all_key()).await?;
        Ok((!items.is_empty()).then_some(items))
    }

    async fn write(&self, tier: &Tier<K, T>, items: &[T], expiry: Expiry) -> Result<()> {
        let item_keys = tier.keys().item_keys(tier.name());
        tier.backend()
            .set_all(tier.keys().all_key(), items, &item_keys, expiry)
            .await
    }
}

#[async_trait]
impl<'l, K, T> Access<K, T> for List<'l>
where
    K: Sync,
    T: CacheItem,
{
    type Value = [T];
    type Owned = Vec<T>;

    fn physical_key(&self, tier: &Tier<K, T>) -> String {
        tier.keys().list_key(self.id)
    }

    async fn read(&self, tier: &Tier<K, T>) -> Result<Option<Vec<T>>> {
        let key = tier.keys().list_key(self.id);
        let items = tier.backend().get_list(&key).await?;
        Ok((!items.is_empty()).then_some(items))
    }

    async fn write(&self, tier: &Tier<K, T>, items: &[T], expiry: Expiry) -> Result<()> {
        let key = tier.keys().list_key(self.id);
        let item_keys = tier.keys().item_keys(tier.name());
        tier.backend().set_list(&key, items, &item_keys, expiry).await
    }
}

impl<K, T> Chain<K, T>
where
    K: Sync,
    T: CacheItem,
{
    /// Read starting at `start`. With `from_tail`, every tier before the
    /// last one is passed without being read.
    async fn cascade_read<A>(
        &self,
        start: usize,
        access: &A,
        opts: &CallOptions,
        update_downstream: bool,
        from_tail: bool,
    ) -> Result<Option<A::Owned>>
    where
        A: Access<K, T>,
    {
        let last = self.last_index();
        let mut passed = Vec::new();
        let mut found = None;

        for index in start..=last {
            let tier = &self.tiers[index];

            // Refresh walks past these tiers without consulting them.
            if from_tail && index < last {
                debug!(tier = %tier.name(), key = %access.physical_key(tier), "Passed for refresh");
                passed.push(index);
                continue;
            }

            if opts.skips_read(index, tier) {
                debug!(tier = %tier.name(), key = %access.physical_key(tier), "Read skipped");
                self.metrics.record_lookup(tier.name(), LookupOutcome::Skip);
                passed.push(index);
                continue;
            }

            match access.read(tier).await? {
                Some(value) => {
                    debug!(tier = %tier.name(), key = %access.physical_key(tier), "Hit");
                    self.metrics.record_lookup(tier.name(), LookupOutcome::Hit);
                    found = Some(value);
                    break;
                }
                None => {
                    debug!(tier = %tier.name(), key = %access.physical_key(tier), "Miss");
                    self.metrics.record_lookup(tier.name(), LookupOutcome::Miss);
                    passed.push(index);
                }
            }
        }

        let Some(value) = found else {
            return Ok(None);
        };

        if update_downstream {
            for &index in passed.iter().rev() {
                let tier = &self.tiers[index];
                if opts.skips_write(index, tier) {
                    debug!(tier = %tier.name(), "Back-fill skipped");
                    continue;
                }

                let expiry = tier.expiration().expiry_at(SystemTime::now());
                let stored: &A::Value = value.borrow();
                access.write(tier, stored, expiry).await?;
                debug!(tier = %tier.name(), key = %access.physical_key(tier), "Back-filled");
                self.metrics.record_write(tier.name(), WriteReason::Backfill);
            }
        }

        Ok(Some(value))
    }

    async fn cascade_write<A>(
        &self,
        start: usize,
        access: &A,
        value: &A::Value,
        opts: &CallOptions,
        fan_out: bool,
    ) -> Result<()>
    where
        A: Access<K, T>,
    {
        for index in start..=self.last_index() {
            let tier = &self.tiers[index];

            if opts.skips_write(index, tier) {
                debug!(tier = %tier.name(), key = %access.physical_key(tier), "Write skipped");
            } else {
                let expiry = tier.expiration().expiry_at(SystemTime::now());
                access.write(tier, value, expiry).await?;
                debug!(tier = %tier.name(), key = %access.physical_key(tier), "Wrote");
                self.metrics.record_write(tier.name(), WriteReason::Set);
            }

            if !fan_out {
                break;
            }
        }
        Ok(())
    }

    async fn cascade_delete(
        &self,
        start: usize,
        key: &K,
        fan_out: bool,
    ) -> Result<()> {
        for index in start..=self.last_index() {
            let tier = &self.tiers[index];
            let physical = tier.keys().physical_key(key);

            tier.backend().delete(&physical).await?;
            debug!(tier = %tier.name(), key = %physical, "Deleted");
            self.metrics.record_delete(tier.name());

            if !fan_out {
                break;
            }
        }
        Ok(())
    }
}

impl<K, T> TierRef<'_, K, T>
where
    K: Sync,
    T: CacheItem,
{
    /// Read one item, falling through to later tiers on a miss.
    ///
    /// Back-fills the tiers it passed unless `opts.downstream(false)`.
    pub async fn get(&self, key: &K, opts: &CallOptions) -> Result<Option<T>> {
        self.chain
            .cascade_read(self.index, &One { key }, opts, opts.downstream_or(true), false)
            .await
    }

    /// Read the whole collection stored under each tier's get-all key.
    pub async fn get_all(&self, opts: &CallOptions) -> Result<Vec<T>> {
        let items = self
            .chain
            .cascade_read(self.index, &All, opts, opts.downstream_or(true), false)
            .await?;
        Ok(items.unwrap_or_default())
    }

    /// Read the list identified by `list_id`.
    pub async fn get_list(&self, list_id: &str, opts: &CallOptions) -> Result<Vec<T>> {
        let items = self
            .chain
            .cascade_read(
                self.index,
                &List { id: list_id },
                opts,
                opts.downstream_or(true),
                false,
            )
            .await?;
        Ok(items.unwrap_or_default())
    }

    /// Write one item to this tier, and to later tiers with `opts.downstream(true)`.
    pub async fn set(&self, key: &K, item: &T, opts: &CallOptions) -> Result<()> {
        self.chain
            .cascade_write(self.index, &One { key }, item, opts, opts.downstream_or(false))
            .await
    }

    pub async fn set_all(&self, items: &[T], opts: &CallOptions) -> Result<()> {
        self.chain
            .cascade_write(self.index, &All, items, opts, opts.downstream_or(false))
            .await
    }

    pub async fn set_list(&self, list_id: &str, items: &[T], opts: &CallOptions) -> Result<()> {
        self.chain
            .cascade_write(
                self.index,
                &List { id: list_id },
                items,
                opts,
                opts.downstream_or(false),
            )
            .await
    }

    /// Delete locally; later tiers too with `opts.downstream(true)`.
    /// Skip selectors do not apply to deletes.
    pub async fn delete(&self, key: &K, opts: &CallOptions) -> Result<()> {
        self.chain
            .cascade_delete(self.index, key, opts.downstream_or(false))
            .await
    }

    /// Re-read `key` from the last tier and store it in every tier from this
    /// one down. On the last tier this is a plain back-filling `get`.
    pub async fn refresh(&self, key: &K, opts: &CallOptions) -> Result<Option<T>> {
        self.chain
            .cascade_read(self.index, &One { key }, opts, true, true)
            .await
    }
}
