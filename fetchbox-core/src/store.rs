//! Cache storage capability.
//!
//! Cached responses live in named caches. A [`CacheStorage`] opens caches by
//! name, and each [`CacheHandle`] stores responses addressed by request
//! identity. The storage engine itself is supplied by the host.

use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BoxError, Request, Response};

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write does not fit into the storage limits.
    #[error("storage quota exceeded while writing {url}")]
    QuotaExceeded {
        /// URL of the rejected entry.
        url: String,
    },

    /// Only `GET` requests can address stored entries.
    #[error("request method {method} is not supported by cache storage")]
    UnsupportedMethod {
        /// Method of the rejected request.
        method: Method,
    },

    /// Any other storage engine error.
    #[error(transparent)]
    Internal(BoxError),
}

/// Options for matching a request against stored entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MatchOptions {
    /// Ignore the URL query string when comparing.
    pub ignore_search: bool,
    /// Ignore the `Vary` header of stored responses.
    pub ignore_vary: bool,
}

impl MatchOptions {
    /// Sets `ignore_search`.
    pub fn ignore_search(self, ignore_search: bool) -> Self {
        Self {
            ignore_search,
            ..self
        }
    }

    /// Sets `ignore_vary`.
    pub fn ignore_vary(self, ignore_vary: bool) -> Self {
        Self {
            ignore_vary,
            ..self
        }
    }
}

/// Options for matching across the caches of a storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiMatchOptions {
    /// Per-entry match options.
    pub match_options: MatchOptions,
    /// Restrict the search to one cache.
    pub cache_name: Option<String>,
}

impl MultiMatchOptions {
    /// Searches only the cache named `cache_name`.
    pub fn in_cache(cache_name: impl Into<String>, match_options: MatchOptions) -> Self {
        Self {
            match_options,
            cache_name: Some(cache_name.into()),
        }
    }
}

/// A single named cache.
#[async_trait]
pub trait CacheHandle: Send + Sync {
    /// Name the cache was opened with.
    fn name(&self) -> &str;

    /// First stored response matching `request`.
    async fn match_request(
        &self,
        request: &Request,
        options: MatchOptions,
    ) -> StoreResult<Option<Response>>;

    /// Stores `response` under `request`, replacing any matching entry.
    async fn put(&self, request: &Request, response: Response) -> StoreResult<()>;

    /// Requests of the stored entries, optionally filtered by `request`.
    async fn keys(
        &self,
        request: Option<&Request>,
        options: MatchOptions,
    ) -> StoreResult<Vec<Request>>;

    /// Removes every entry matching `request`. Returns whether anything was removed.
    async fn delete(&self, request: &Request, options: MatchOptions) -> StoreResult<bool>;
}

/// A collection of named caches.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Opens the cache named `name`, creating it when absent.
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn CacheHandle>>;

    /// Whether a cache named `name` exists.
    async fn has(&self, name: &str) -> StoreResult<bool>;

    /// Deletes the cache named `name`. Returns whether it existed.
    async fn delete(&self, name: &str) -> StoreResult<bool>;

    /// Names of the existing caches in creation order.
    async fn names(&self) -> StoreResult<Vec<String>>;

    /// Searches the named cache, or every cache in creation order.
    ///
    /// Searching a cache that does not exist yields no match and does not
    /// create it.
    async fn match_request(
        &self,
        request: &Request,
        options: MultiMatchOptions,
    ) -> StoreResult<Option<Response>> {
        let names = match options.cache_name {
            Some(name) if self.has(&name).await? => vec![name],
            Some(_) => return Ok(None),
            None => self.names().await?,
        };

        for name in names {
            let cache = self.open(&name).await?;
            if let Some(response) = cache
                .match_request(request, options.match_options)
                .await?
            {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<T> CacheStorage for Arc<T>
where
    T: CacheStorage + ?Sized,
{
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn CacheHandle>> {
        (**self).open(name).await
    }

    async fn has(&self, name: &str) -> StoreResult<bool> {
        (**self).has(name).await
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        (**self).delete(name).await
    }

    async fn names(&self) -> StoreResult<Vec<String>> {
        (**self).names().await
    }

    async fn match_request(
        &self,
        request: &Request,
        options: MultiMatchOptions,
    ) -> StoreResult<Option<Response>> {
        (**self).match_request(request, options).await
    }
}

#[async_trait]
impl<T> CacheStorage for Box<T>
where
    T: CacheStorage + ?Sized,
{
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn CacheHandle>> {
        (**self).open(name).await
    }

    async fn has(&self, name: &str) -> StoreResult<bool> {
        (**self).has(name).await
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        (**self).delete(name).await
    }

    async fn names(&self) -> StoreResult<Vec<String>> {
        (**self).names().await
    }

    async fn match_request(
        &self,
        request: &Request,
        options: MultiMatchOptions,
    ) -> StoreResult<Option<Response>> {
        (**self).match_request(request, options).await
    }
}
