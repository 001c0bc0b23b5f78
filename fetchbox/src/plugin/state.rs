use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::Extensions;

/// Per-plugin record scoped to one handled request.
///
/// Every plugin gets its own empty state for each request, so values stored
/// by one hook can be read back by a later hook for the same request.
#[derive(Debug, Clone, Default)]
pub struct PluginState {
    values: Arc<Mutex<Extensions>>,
}

impl PluginState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, Extensions> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value`, returning the previous value of the same type.
    pub fn insert<T>(&self, value: T) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values().insert(value)
    }

    /// Copy of the stored value of type `T`.
    pub fn get<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values().get::<T>().cloned()
    }

    /// Removes the stored value of type `T`.
    pub fn remove<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values().remove::<T>()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}
