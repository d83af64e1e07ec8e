//! Durable backend on the local filesystem.
//!
//! Every entry is one JSON file (optionally zstd-compressed) holding the
//! value and its [`Expiry`]. Collections are stored as ordered documents
//! deduplicated by the tier's item-key function, so writing the same item
//! twice never duplicates it. Uses tokio's async file I/O.
//!
//! Files are replaced atomically (temp file + rename) and every operation on
//! a path holds that path's lock, so a sliding read can never put back a
//! value an overlapping write already replaced.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::cascade::backend::Backend;
use crate::cascade::capability::{Capability, CapabilitySet};
use crate::cascade::expiration::Expiry;
use crate::cascade::keys::ItemKeys;
use crate::error::Result;

/// Longest encoded key used verbatim as a file stem.
const MAX_FILE_STEM: usize = 120;

/// Readable prefix kept in front of the hash for long keys.
const HASHED_PREFIX: usize = 64;

/// Idle path locks are pruned once the table grows past this.
const LOCK_TABLE_PRUNE_AT: usize = 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Record<V> {
    expiry: Expiry,
    value: V,
}

#[derive(Debug, Default)]
pub struct DiskStats {
    pub total_writes: AtomicU64,
    pub total_reads: AtomicU64,
    pub total_bytes_written: AtomicU64,
    pub total_bytes_read: AtomicU64,
}

/// Filesystem-backed durable tier storage.
#[derive(Debug)]
pub struct DiskBackend {
    root: PathBuf,
    zstd_level: Option<i32>,
    stats: DiskStats,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DiskBackend {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("items")).await?;
        fs::create_dir_all(root.join("collections")).await?;

        Ok(Self {
            root,
            zstd_level: None,
            stats: DiskStats::default(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Compress files with zstd at the given level (1-22).
    pub fn with_zstd(mut self, level: i32) -> Self {
        self.zstd_level = Some(level);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> &DiskStats {
        &self.stats
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root.join("items").join(self.file_name(key))
    }

    fn collection_path(&self, key: &str) -> PathBuf {
        self.root.join("collections").join(self.file_name(key))
    }

    fn file_name(&self, key: &str) -> String {
        let ext = if self.zstd_level.is_some() { "json.zst" } else { "json" };
        format!("{}.{ext}", encode_key(key))
    }

    /// Exclusive access to one file for the duration of an operation.
    async fn lock_path(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= LOCK_TABLE_PRUNE_AT {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(path.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }

    async fn read_record<V: DeserializeOwned>(&self, path: &Path) -> Result<Option<Record<V>>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        self.stats.total_reads.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_bytes_read
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        let json = match self.zstd_level {
            Some(_) => zstd::decode_all(data.as_slice())?,
            None => data,
        };
        Ok(Some(serde_json::from_slice(&json)?))
    }

    /// Write to a temp file next to `path`, then rename it into place.
    async fn write_record<V: Serialize>(&self, path: &Path, record: &Record<V>) -> Result<()> {
        let json = serde_json::to_vec(record)?;
        let data = match self.zstd_level {
            Some(level) => zstd::encode_all(json.as_slice(), level)?,
            None => json,
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        fs::write(&tmp, &data).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            remove_if_exists(&tmp).await?;
            return Err(e.into());
        }

        debug!(path = %path.display(), size = data.len(), "Wrote record");
        self.stats.total_writes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Read a live record, deleting it if expired and rewriting it if sliding.
    async fn load_live<V>(&self, path: &Path) -> Result<Option<V>>
    where
        V: Serialize + DeserializeOwned,
    {
        let _guard = self.lock_path(path).await;

        let Some(mut record) = self.read_record::<V>(path).await? else {
            return Ok(None);
        };

        let now = SystemTime::now();
        if record.expiry.is_expired(now) {
            remove_if_exists(path).await?;
            debug!(path = %path.display(), "Dropped expired record");
            return Ok(None);
        }

        if record.expiry.sliding.is_some() {
            record.expiry = record.expiry.touched(now);
            self.write_record(path, &record).await?;
        }
        Ok(Some(record.value))
    }

    async fn store<V: Serialize>(&self, path: &Path, record: &Record<V>) -> Result<()> {
        let _guard = self.lock_path(path).await;
        self.write_record(path, record).await
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let _guard = self.lock_path(path).await;
        remove_if_exists(path).await
    }

    /// Collections keep write order; a repeated item key replaces the earlier
    /// entry in its original position.
    async fn store_collection<T>(
        &self,
        key: &str,
        items: &[T],
        item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()>
    where
        T: Serialize + Clone,
    {
        let mut entries: Vec<(String, T)> = Vec::with_capacity(items.len());
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(items.len());

        for item in items {
            let item_key = item_keys.key_of(item)?;
            match positions.get(&item_key) {
                Some(&pos) => entries[pos].1 = item.clone(),
                None => {
                    positions.insert(item_key.clone(), entries.len());
                    entries.push((item_key, item.clone()));
                }
            }
        }

        self.store(
            &self.collection_path(key),
            &Record {
                expiry,
                value: entries,
            },
        )
        .await
    }

    async fn load_collection<T>(&self, key: &str) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let entries: Option<Vec<(String, T)>> =
            self.load_live(&self.collection_path(key)).await?;
        Ok(entries
            .map(|e| e.into_iter().map(|(_, item)| item).collect())
            .unwrap_or_default())
    }
}

/// Make a key safe to use as a file name. Alphanumerics, `-` and `_` pass
/// through; every other byte becomes `%XX`. Keys that would encode too long
/// keep a readable prefix followed by `~` and their SHA-256.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }

    if out.len() <= MAX_FILE_STEM {
        return out;
    }
    // `out` is ASCII, so any byte offset is a char boundary.
    format!("{}~{:x}", &out[..HASHED_PREFIX], Sha256::digest(key.as_bytes()))
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl<T> Backend<T> for DiskBackend
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "disk"
    }

    fn capabilities(&self) -> CapabilitySet {
        Capability::Durable.into()
    }

    async fn get_one(&self, key: &str) -> Result<Option<T>> {
        self.load_live(&self.item_path(key)).await
    }

    async fn get_all(&self, key: &str) -> Result<Vec<T>> {
        self.load_collection(key).await
    }

    async fn get_list(&self, key: &str) -> Result<Vec<T>> {
        self.load_collection(key).await
    }

    async fn set_one(&self, key: &str, item: &T, expiry: Expiry) -> Result<()> {
        self.store(&self.item_path(key), &Record { expiry, value: item })
            .await
    }

    async fn set_all(
        &self,
        key: &str,
        items: &[T],
        item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()> {
        self.store_collection(key, items, item_keys, expiry).await
    }

    async fn set_list(
        &self,
        key: &str,
        items: &[T],
        item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()> {
        self.store_collection(key, items, item_keys, expiry).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.remove(&self.item_path(key)).await?;
        self.remove(&self.collection_path(key)).await
    }
}
