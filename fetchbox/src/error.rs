//! Error types for routing and strategy execution.

use std::time::Duration;

use fetchbox_core::{BoxError, FetchError, StoreError};
use http::Method;
use thiserror::Error;

use crate::plugin::HookKind;

/// Error type for strategy execution and request handling.
#[derive(Debug, Error)]
pub enum Error {
    /// A strategy was asked to handle a request that cannot go over the network.
    #[error("strategy cannot handle non http(s) request {url}")]
    NotHttpRequest {
        /// Rejected URL.
        url: String,
    },

    /// The network call failed or returned an unusable response.
    #[error(transparent)]
    NetworkFailure(#[from] FetchError),

    /// The network call did not settle before the strategy timeout.
    #[error("network request to {url} timed out after {timeout:?}")]
    NetworkTimeout {
        /// Requested URL.
        url: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// Nothing matched in the cache and no other source is allowed.
    #[error("no cached response for {url}")]
    CacheMiss {
        /// Requested URL.
        url: String,
    },

    /// A `requestWillFetch` hook failed.
    #[error("plugin failed to transform request: {0}")]
    PluginRequestTransform(#[source] BoxError),

    /// The cache write was rejected by storage limits.
    #[error("storage quota exceeded while caching {url}")]
    QuotaExceeded {
        /// URL of the rejected entry.
        url: String,
    },

    /// A cache key hook produced something that cannot address a cache entry.
    #[error("unsupported cache key {key:?}")]
    UnsupportedCacheKeyType {
        /// The offending key.
        key: String,
    },

    /// Only `GET` requests may be written to the cache.
    #[error("refusing to cache {method} request {url}")]
    NonGetCacheWrite {
        /// Method of the rejected request.
        method: Method,
        /// URL of the rejected request.
        url: String,
    },

    /// The strategy produced an error response instead of a usable one.
    #[error("no usable response for {url}")]
    UnusableResponse {
        /// Requested URL.
        url: String,
    },

    /// A URL string could not be turned into a request.
    #[error("invalid url {input:?}")]
    InvalidUrl {
        /// The rejected input.
        input: String,
        /// Parse error.
        #[source]
        source: url::ParseError,
    },

    /// A plugin hook failed.
    #[error("plugin {plugin} failed in {hook}: {source}")]
    Plugin {
        /// Plugin name.
        plugin: String,
        /// Failing hook.
        hook: HookKind,
        /// Hook error.
        #[source]
        source: BoxError,
    },

    /// Any other cache storage failure.
    #[error(transparent)]
    Store(StoreError),

    /// A background task panicked or was cancelled.
    #[error(transparent)]
    BackgroundTask(#[from] tokio::task::JoinError),

    /// A route handler failed.
    #[error(transparent)]
    Handler(BoxError),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::QuotaExceeded { url } => Error::QuotaExceeded { url },
            other => Error::Store(other),
        }
    }
}

impl Error {
    /// Whether the error means the network could not provide a response.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::NetworkFailure(_) | Error::NetworkTimeout { .. })
    }
}

/// Error type for router bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// No route was ever registered for the method.
    #[error("no routes registered for method {method}")]
    RouteNotFound {
        /// Route method.
        method: Method,
    },

    /// The route is not registered for its method.
    #[error("route is not registered for method {method}")]
    RouteNotRegistered {
        /// Route method.
        method: Method,
    },

    /// A string capture is neither a path nor an absolute http URL.
    #[error("invalid route capture {capture:?}: must start with '/' or 'http'")]
    InvalidRouteCapture {
        /// The rejected capture.
        capture: String,
    },
}
