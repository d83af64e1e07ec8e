//! Backend that records every primitive it receives.
//!
//! Stores data in an [`InMemoryBackend`], logs each call for later
//! verification and supports failure injection, which makes it the tool of
//! choice for testing cascade behavior and error paths.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backends::memory::InMemoryBackend;
use crate::cascade::backend::Backend;
use crate::cascade::capability::{Capability, CapabilitySet};
use crate::cascade::expiration::Expiry;
use crate::cascade::keys::ItemKeys;
use crate::error::{CascadeError, Result};

/// One recorded primitive, with the physical key it was called with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    GetOne(String),
    GetAll(String),
    GetList(String),
    SetOne(String),
    SetAll(String),
    SetList(String),
    Delete(String),
}

impl BackendOp {
    pub fn key(&self) -> &str {
        match self {
            BackendOp::GetOne(k)
            | BackendOp::GetAll(k)
            | BackendOp::GetList(k)
            | BackendOp::SetOne(k)
            | BackendOp::SetAll(k)
            | BackendOp::SetList(k)
            | BackendOp::Delete(k) => k,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(
            self,
            BackendOp::GetOne(_) | BackendOp::GetAll(_) | BackendOp::GetList(_)
        )
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            BackendOp::SetOne(_) | BackendOp::SetAll(_) | BackendOp::SetList(_)
        )
    }
}

type FailPredicate = Box<dyn Fn(&BackendOp) -> bool + Send + Sync>;

/// Recording, failure-injectable backend. Clones share state.
pub struct RecordingBackend<T> {
    store: InMemoryBackend<T>,
    capabilities: CapabilitySet,
    operations: Arc<Mutex<Vec<BackendOp>>>,
    expiries: Arc<Mutex<Vec<Expiry>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl<T> Clone for RecordingBackend<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            capabilities: self.capabilities.clone(),
            operations: Arc::clone(&self.operations),
            expiries: Arc::clone(&self.expiries),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<T> std::fmt::Debug for RecordingBackend<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBackend")
            .field("capabilities", &self.capabilities)
            .field("operations", &*self.operations.lock())
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<T> Default for RecordingBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordingBackend<T> {
    /// A recording backend that reports the in-process capability.
    pub fn new() -> Self {
        Self::with_capabilities(Capability::InProcess.into())
    }

    /// A recording backend that reports the given capabilities instead.
    pub fn with_capabilities(capabilities: CapabilitySet) -> Self {
        Self {
            store: InMemoryBackend::new(),
            capabilities,
            operations: Arc::new(Mutex::new(Vec::new())),
            expiries: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Fail every operation matching `predicate` with a backend error.
    pub fn fail_when(&self, predicate: impl Fn(&BackendOp) -> bool + Send + Sync + 'static) {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    pub fn stop_failing(&self) {
        *self.fail_when.lock() = None;
    }

    pub fn operations(&self) -> Vec<BackendOp> {
        self.operations.lock().clone()
    }

    pub fn reads(&self) -> Vec<BackendOp> {
        self.operations().into_iter().filter(BackendOp::is_read).collect()
    }

    pub fn writes(&self) -> Vec<BackendOp> {
        self.operations().into_iter().filter(BackendOp::is_write).collect()
    }

    /// Expiries received by the write primitives, in call order.
    pub fn expiries(&self) -> Vec<Expiry> {
        self.expiries.lock().clone()
    }

    pub fn clear_operations(&self) {
        self.operations.lock().clear();
        self.expiries.lock().clear();
    }

    /// The underlying store, for inspecting contents without recording.
    pub fn store(&self) -> &InMemoryBackend<T> {
        &self.store
    }

    fn record(&self, op: BackendOp) -> Result<()> {
        let fail = self
            .fail_when
            .lock()
            .as_ref()
            .is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op.clone());

        if fail {
            return Err(CascadeError::backend(
                "recording",
                format!("injected failure for {op:?}"),
            ));
        }
        Ok(())
    }

    fn record_write(&self, op: BackendOp, expiry: Expiry) -> Result<()> {
        self.expiries.lock().push(expiry);
        self.record(op)
    }
}

#[async_trait]
impl<T> Backend<T> for RecordingBackend<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "recording"
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    async fn get_one(&self, key: &str) -> Result<Option<T>> {
        self.record(BackendOp::GetOne(key.to_string()))?;
        self.store.get_one(key).await
    }

    async fn get_all(&self, key: &str) -> Result<Vec<T>> {
        self.record(BackendOp::GetAll(key.to_string()))?;
        self.store.get_all(key).await
    }

    async fn get_list(&self, key: &str) -> Result<Vec<T>> {
        self.record(BackendOp::GetList(key.to_string()))?;
        self.store.get_list(key).await
    }

    async fn set_one(&self, key: &str, item: &T, expiry: Expiry) -> Result<()> {
        self.record_write(BackendOp::SetOne(key.to_string()), expiry)?;
        self.store.set_one(key, item, expiry).await
    }

    async fn set_all(
        &self,
        key: &str,
        items: &[T],
        item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()> {
        self.record_write(BackendOp::SetAll(key.to_string()), expiry)?;
        self.store.set_all(key, items, item_keys, expiry).await
    }

    async fn set_list(
        &self,
        key: &str,
        items: &[T],
        item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()> {
        self.record_write(BackendOp::SetList(key.to_string()), expiry)?;
        self.store.set_list(key, items, item_keys, expiry).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record(BackendOp::Delete(key.to_string()))?;
        self.store.delete(key).await
    }
}
