//! Remote cache of server-fetched collections.
//!
//! One [`RemoteCache`] per session, passed by handle (it is cheap to
//! clone) to everything that reads or writes tracker data.
//!
//! # Semantics
//!
//! - `get` returns `None` until a key has been fetched or set.
//! - `set` applies an updater to the current value and stores the result
//!   immediately. With `revalidate = true` a background refetch is spawned
//!   that replaces the value when it lands.
//! - Writes to one key apply in call order, last writer wins. A refetch
//!   that completes after a newer optimistic `set` overwrites it; there are
//!   no version tokens.
//! - Every change is broadcast to subscribers as a [`CacheEvent`].
//!
//! The entry map sits behind a `std::sync::Mutex` that is never held
//! across an await.

mod key;
mod retry;

pub use key::{CacheKey, CacheValue, ProjectScope};
pub use retry::RetryPolicy;

use crate::backend::Backend;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Subscriber queue depth before slow receivers start lagging.
const EVENT_CAPACITY: usize = 256;

/// Where a cache change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Local write applied before server confirmation
    Optimistic,
    /// Authoritative value from a refetch
    Revalidated,
    /// Entry dropped
    Invalidated,
}

/// A change to one cache entry.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub key: CacheKey,
    pub value: Option<CacheValue>,
    pub source: UpdateSource,
}

struct Inner<B> {
    backend: B,
    retry: RetryPolicy,
    entries: Mutex<HashMap<CacheKey, CacheValue>>,
    events: broadcast::Sender<CacheEvent>,
}

/// Keyed store of server data with optimistic writes and revalidation.
pub struct RemoteCache<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for RemoteCache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend + 'static> RemoteCache<B> {
    /// Create an empty cache in front of a backend.
    pub fn new(backend: B, retry: RetryPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                backend,
                retry,
                entries: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// The backend this cache fetches from.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Current value for a key, `None` if never fetched.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.entries().get(key).cloned()
    }

    /// Whether a value is cached for the key.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries().contains_key(key)
    }

    /// Keys with a cached value, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries().keys().cloned().collect()
    }

    /// Apply `updater` to the cached value and store the result now.
    ///
    /// The updater receives `None` when nothing is cached; returning `None`
    /// removes the entry. With `revalidate` the authoritative value is
    /// refetched on a spawned task, whose handle is returned. Revalidation
    /// requires a running tokio runtime.
    pub fn set<F>(
        &self,
        key: CacheKey,
        updater: F,
        revalidate: bool,
    ) -> Option<JoinHandle<Result<CacheValue>>>
    where
        F: FnOnce(Option<CacheValue>) -> Option<CacheValue>,
    {
        self.write(key.clone(), updater, UpdateSource::Optimistic);
        revalidate.then(|| self.spawn_revalidate(key))
    }

    /// Refetch a key and replace its value, retrying transient failures.
    ///
    /// On failure the cached value is left as it was.
    ///
    /// # Errors
    ///
    /// Returns the final fetch error.
    pub async fn revalidate(&self, key: &CacheKey) -> Result<CacheValue> {
        let label = key.to_string();
        let backend = &self.inner.backend;

        match self.inner.retry.run(&label, || key.fetch(backend)).await {
            Ok(value) => {
                debug!(key = %label, "revalidated");
                let stored = value.clone();
                self.write(key.clone(), move |_| Some(stored), UpdateSource::Revalidated);
                Ok(value)
            }
            Err(e) => {
                warn!(key = %label, error = %e, "revalidation failed");
                Err(e)
            }
        }
    }

    /// Refetch only if the key is already cached.
    ///
    /// Returns `None` when nothing was cached and no fetch happened.
    pub async fn revalidate_cached(&self, key: &CacheKey) -> Option<Result<CacheValue>> {
        if self.contains(key) {
            Some(self.revalidate(key).await)
        } else {
            None
        }
    }

    /// Spawn [`revalidate`](Self::revalidate) on the tokio runtime.
    pub fn spawn_revalidate(&self, key: CacheKey) -> JoinHandle<Result<CacheValue>> {
        let cache = self.clone();
        tokio::spawn(async move { cache.revalidate(&key).await })
    }

    /// Return the cached value, fetching it first if absent.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when nothing was cached and the fetch failed.
    pub async fn get_or_fetch(&self, key: &CacheKey) -> Result<CacheValue> {
        match self.get(key) {
            Some(value) => Ok(value),
            None => self.revalidate(key).await,
        }
    }

    /// Fetch-and-subscribe: current value, a change stream, and a background refresh.
    ///
    /// The refresh is spawned, so this requires a running tokio runtime.
    pub fn subscribe(&self, key: CacheKey) -> Subscription {
        let receiver = self.inner.events.subscribe();
        let current = self.get(&key);
        let refresh = self.spawn_revalidate(key.clone());
        Subscription {
            key,
            current,
            receiver,
            refresh: Some(refresh),
        }
    }

    /// Drop a cached entry.
    pub fn invalidate(&self, key: &CacheKey) {
        let removed = self.entries().remove(key).is_some();
        if removed {
            self.publish(key.clone(), None, UpdateSource::Invalidated);
        }
    }

    /// Put a snapshot back exactly as captured (`None` removes the entry).
    pub fn restore(&self, key: CacheKey, snapshot: Option<CacheValue>) {
        self.write(key, move |_| snapshot, UpdateSource::Optimistic);
    }

    fn write<F>(&self, key: CacheKey, updater: F, source: UpdateSource)
    where
        F: FnOnce(Option<CacheValue>) -> Option<CacheValue>,
    {
        let next = {
            let mut entries = self.entries();
            let next = updater(entries.remove(&key));
            if let Some(value) = &next {
                entries.insert(key.clone(), value.clone());
            }
            next
        };
        self.publish(key, next, source);
    }

    fn publish(&self, key: CacheKey, value: Option<CacheValue>, source: UpdateSource) {
        // No receivers is not an error.
        let _ = self.inner.events.send(CacheEvent { key, value, source });
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheValue>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// A live view of one cache key.
pub struct Subscription {
    key: CacheKey,
    current: Option<CacheValue>,
    receiver: broadcast::Receiver<CacheEvent>,
    refresh: Option<JoinHandle<Result<CacheValue>>>,
}

impl Subscription {
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Latest value seen by this subscription.
    #[must_use]
    pub const fn current(&self) -> Option<&CacheValue> {
        self.current.as_ref()
    }

    /// Wait for the initial background refresh to settle.
    ///
    /// # Errors
    ///
    /// Returns the refresh's fetch error, or `Error::Other` if the task panicked.
    pub async fn settled(&mut self) -> Result<()> {
        if let Some(handle) = self.refresh.take() {
            handle
                .await
                .map_err(|e| crate::error::Error::Other(format!("refresh task failed: {e}")))??;
        }
        Ok(())
    }

    /// Wait for the next change to this key. Returns `None` once the cache is gone.
    pub async fn next(&mut self) -> Option<CacheEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.key == self.key => {
                    self.current.clone_from(&event.value);
                    return Some(event);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(key = %self.key, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
