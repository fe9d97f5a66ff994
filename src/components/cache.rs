use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use bytes::Bytes;
use log::debug;
use lru::LruCache;

use super::fetch::ObjectFetch;
use crate::{config::ReaderConfig, errors::Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    bucket: String,
    key: String,
    request_pays: bool,
}

/// Slot filled by whichever caller fetched first; later callers wait on it.
type Slot = Arc<Mutex<Option<Bytes>>>;

/// Bounded LRU cache in front of an [`ObjectFetch`].
///
/// At most one fetch is in flight per key: concurrent callers for the
/// same object block on its slot and share the result. Failures are not
/// cached.
pub struct CachedFetch<F> {
    inner: F,
    entries: Mutex<LruCache<CacheKey, Slot>>,
}

impl<F: ObjectFetch> CachedFetch<F> {
    pub fn new(inner: F, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cache sized by `config.cache_capacity`.
    pub fn from_config(inner: F, config: &ReaderConfig) -> Self {
        Self::new(inner, config.cache_capacity)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = entries.get(key) {
            return Arc::clone(slot);
        }
        let slot = Slot::default();
        entries.put(key.clone(), Arc::clone(&slot));
        slot
    }

    fn forget(&self, key: &CacheKey, slot: &Slot) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.peek(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            entries.pop(key);
        }
    }
}

impl<F: ObjectFetch> ObjectFetch for CachedFetch<F> {
    fn fetch(&self, bucket: &str, key: &str, request_pays: bool) -> Result<Bytes> {
        let cache_key = CacheKey {
            bucket: bucket.into(),
            key: key.into(),
            request_pays,
        };
        let slot = self.slot(&cache_key);
        let mut content = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bytes) = content.as_ref() {
            debug!("cache hit s3://{bucket}/{key}");
            return Ok(bytes.clone());
        }
        match self.inner.fetch(bucket, key, request_pays) {
            Ok(bytes) => {
                *content = Some(bytes.clone());
                Ok(bytes)
            }
            Err(error) => {
                drop(content);
                self.forget(&cache_key, &slot);
                Err(error)
            }
        }
    }
}
