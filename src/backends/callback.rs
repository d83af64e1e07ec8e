//! Ad-hoc backend driven by caller-supplied async closures.
//!
//! Useful for wrapping a store that has no dedicated backend (an HTTP API, a
//! database query). Every primitive is wired separately; invoking one that
//! was never wired is a caller bug and fails with
//! [`CascadeError::NotConfigured`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::error;

use crate::cascade::backend::Backend;
use crate::cascade::capability::{Capability, CapabilitySet};
use crate::cascade::expiration::Expiry;
use crate::cascade::keys::ItemKeys;
use crate::error::{CascadeError, Result};

type GetOneFn<T> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Option<T>>> + Send + Sync>;
type GetManyFn<T> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;
type SetOneFn<T> = Arc<dyn Fn(String, T, Expiry) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type SetManyFn<T> =
    Arc<dyn Fn(String, Vec<T>, Expiry) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type DeleteFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

pub struct CallbackBackend<T> {
    get_one: Option<GetOneFn<T>>,
    get_all: Option<GetManyFn<T>>,
    get_list: Option<GetManyFn<T>>,
    set_one: Option<SetOneFn<T>>,
    set_all: Option<SetManyFn<T>>,
    set_list: Option<SetManyFn<T>>,
    delete: Option<DeleteFn>,
}

impl<T> fmt::Debug for CallbackBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackBackend")
            .field("get_one", &self.get_one.is_some())
            .field("get_all", &self.get_all.is_some())
            .field("get_list", &self.get_list.is_some())
            .field("set_one", &self.set_one.is_some())
            .field("set_all", &self.set_all.is_some())
            .field("set_list", &self.set_list.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

impl<T> Default for CallbackBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CallbackBackend<T> {
    /// A backend with nothing wired in.
    pub fn new() -> Self {
        Self {
            get_one: None,
            get_all: None,
            get_list: None,
            set_one: None,
            set_all: None,
            set_list: None,
            delete: None,
        }
    }
}

impl<T: Send + 'static> CallbackBackend<T> {
    pub fn on_get_one<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>>> + Send + 'static,
    {
        self.get_one = Some(Arc::new(move |key| f(key).boxed()));
        self
    }

    pub fn on_get_all<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        self.get_all = Some(Arc::new(move |key| f(key).boxed()));
        self
    }

    pub fn on_get_list<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        self.get_list = Some(Arc::new(move |key| f(key).boxed()));
        self
    }

    pub fn on_set_one<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, T, Expiry) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_one = Some(Arc::new(move |key, item, expiry| f(key, item, expiry).boxed()));
        self
    }

    pub fn on_set_all<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, Vec<T>, Expiry) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_all = Some(Arc::new(move |key, items, expiry| f(key, items, expiry).boxed()));
        self
    }

    pub fn on_set_list<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, Vec<T>, Expiry) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_list = Some(Arc::new(move |key, items, expiry| f(key, items, expiry).boxed()));
        self
    }

    pub fn on_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.delete = Some(Arc::new(move |key| f(key).boxed()));
        self
    }
}

fn wired<'a, F: ?Sized>(f: &'a Option<Arc<F>>, operation: &'static str) -> Result<&'a F> {
    match f {
        Some(f) => Ok(f.as_ref()),
        None => {
            error!(operation, "Callback backend invoked for an unwired operation");
            Err(CascadeError::NotConfigured { operation })
        }
    }
}

#[async_trait]
impl<T> Backend<T> for CallbackBackend<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "callback"
    }

    fn capabilities(&self) -> CapabilitySet {
        Capability::Callback.into()
    }

    async fn get_one(&self, key: &str) -> Result<Option<T>> {
        let callback = wired(&self.get_one, "get_one")?;
        callback(key.to_string()).await
    }

    async fn get_all(&self, key: &str) -> Result<Vec<T>> {
        let callback = wired(&self.get_all, "get_all")?;
        callback(key.to_string()).await
    }

    async fn get_list(&self, key: &str) -> Result<Vec<T>> {
        let callback = wired(&self.get_list, "get_list")?;
        callback(key.to_string()).await
    }

    async fn set_one(&self, key: &str, item: &T, expiry: Expiry) -> Result<()> {
        let callback = wired(&self.set_one, "set_one")?;
        callback(key.to_string(), item.clone(), expiry).await
    }

    async fn set_all(
        &self,
        key: &str,
        items: &[T],
        _item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()> {
        let callback = wired(&self.set_all, "set_all")?;
        callback(key.to_string(), items.to_vec(), expiry).await
    }

    async fn set_list(
        &self,
        key: &str,
        items: &[T],
        _item_keys: &ItemKeys<'_, T>,
        expiry: Expiry,
    ) -> Result<()> {
        let callback = wired(&self.set_list, "set_list")?;
        callback(key.to_string(), items.to_vec(), expiry).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let callback = wired(&self.delete, "delete")?;
        callback(key.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_unwired_operation_fails() {
        let backend = CallbackBackend::<u32>::new();
        let err = backend.get_one("k").await.unwrap_err();
        assert!(matches!(err, CascadeError::NotConfigured { operation: "get_one" }));
    }

    #[tokio::test]
    async fn test_wired_callbacks_are_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let backend = CallbackBackend::<u32>::new()
            .on_get_one(|key| async move { Ok(key.parse::<u32>().ok()) })
            .on_set_one(move |_key, _item, _expiry| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });

        assert_eq!(backend.get_one("12").await.unwrap(), Some(12));
        backend.set_one("a", &1, Expiry::NEVER).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(backend.delete("a").await.is_err());
    }
}
