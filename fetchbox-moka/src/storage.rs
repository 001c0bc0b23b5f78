//! Moka cache storage implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use fetchbox_core::{CacheHandle, CacheStorage, StoreResult};
use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::builder::MokaCacheStorageBuilder;
use crate::cache::MokaCache;

/// In-memory cache storage powered by Moka.
///
/// Every opened cache is a separate [`MokaCache`]. Caches are kept in creation
/// order, which is the order a storage-wide match searches them in.
///
/// # Caveats
///
/// - Data is **not persisted**; caches are lost on process restart
/// - Eviction is **best-effort**; evicted entries may briefly remain readable
///
/// ```
/// use fetchbox_core::CacheStorage;
/// use fetchbox_moka::MokaCacheStorage;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let storage = MokaCacheStorage::new();
/// storage.open("pages").await.unwrap();
/// assert_eq!(storage.names().await.unwrap(), vec!["pages".to_string()]);
/// # }
/// ```
#[derive(Clone)]
pub struct MokaCacheStorage {
    caches: Arc<Mutex<IndexMap<SmolStr, Arc<MokaCache>>>>,
    max_capacity: u64,
    max_entry_bytes: Option<usize>,
}

impl MokaCacheStorage {
    /// Creates a storage with default limits.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder.
    pub fn builder() -> MokaCacheStorageBuilder {
        MokaCacheStorageBuilder::new()
    }

    pub(crate) fn from_limits(max_capacity: u64, max_entry_bytes: Option<usize>) -> Self {
        Self {
            caches: Arc::new(Mutex::new(IndexMap::new())),
            max_capacity,
            max_entry_bytes,
        }
    }

    fn caches(&self) -> MutexGuard<'_, IndexMap<SmolStr, Arc<MokaCache>>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the cache named `name` with its concrete type.
    pub fn cache(&self, name: &str) -> Arc<MokaCache> {
        self.caches()
            .entry(SmolStr::new(name))
            .or_insert_with(|| {
                debug!(cache = name, "creating cache");
                Arc::new(MokaCache::new(
                    SmolStr::new(name),
                    self.max_capacity,
                    self.max_entry_bytes,
                ))
            })
            .clone()
    }
}

impl Default for MokaCacheStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MokaCacheStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheStorage")
            .field("caches", &self.caches().keys().collect::<Vec<_>>())
            .field("max_capacity", &self.max_capacity)
            .field("max_entry_bytes", &self.max_entry_bytes)
            .finish()
    }
}

#[async_trait]
impl CacheStorage for MokaCacheStorage {
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn CacheHandle>> {
        Ok(self.cache(name))
    }

    async fn has(&self, name: &str) -> StoreResult<bool> {
        Ok(self.caches().contains_key(name))
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        let removed = self.caches().shift_remove(name);
        if let Some(cache) = &removed {
            debug!(cache = name, "deleting cache");
            cache.invalidate_all();
        }
        Ok(removed.is_some())
    }

    async fn names(&self) -> StoreResult<Vec<String>> {
        Ok(self.caches().keys().map(SmolStr::to_string).collect())
    }
}
