//! Builder for configuring [`MokaCacheStorage`].

use crate::storage::MokaCacheStorage;

/// Default number of URLs each cache holds before Moka starts evicting.
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Builder for a [`MokaCacheStorage`].
///
/// ```
/// use fetchbox_moka::MokaCacheStorage;
///
/// let storage = MokaCacheStorage::builder()
///     .max_capacity(1_000)
///     .max_entry_bytes(512 * 1024)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MokaCacheStorageBuilder {
    max_capacity: u64,
    max_entry_bytes: Option<usize>,
}

impl Default for MokaCacheStorageBuilder {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            max_entry_bytes: None,
        }
    }
}

impl MokaCacheStorageBuilder {
    /// Creates a builder with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of URLs per cache. Least recently used URLs are evicted beyond it.
    pub fn max_capacity(self, max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..self
        }
    }

    /// Largest response body accepted by `put`.
    ///
    /// Larger bodies fail with [`StoreError::QuotaExceeded`](fetchbox_core::StoreError::QuotaExceeded).
    pub fn max_entry_bytes(self, max_entry_bytes: usize) -> Self {
        Self {
            max_entry_bytes: Some(max_entry_bytes),
            ..self
        }
    }

    /// Builds the storage.
    pub fn build(self) -> MokaCacheStorage {
        MokaCacheStorage::from_limits(self.max_capacity, self.max_entry_bytes)
    }
}
