//! Network capability.
//!
//! [`Fetch`] is the single-shot network call strategies use on cache misses
//! and for network-first policies. Like an upstream service it is framework
//! agnostic: `fetchbox-tower` implements it for tower services, and
//! [`fetch_fn`] adapts an async closure.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{BoxError, Request, Response};

/// Error type for network calls.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("network request to {url} failed: {source}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        source: BoxError,
    },

    /// The network produced a response that cannot be used.
    #[error("network returned an unusable response for {url}")]
    Unusable {
        /// Requested URL.
        url: String,
    },
}

impl FetchError {
    /// Wraps a transport error for `request`.
    pub fn network(request: &Request, source: impl Into<BoxError>) -> Self {
        FetchError::Network {
            url: request.url().to_string(),
            source: source.into(),
        }
    }
}

/// Trait for sending requests to the network.
///
/// # Examples
///
/// ```
/// use fetchbox_core::{Fetch, Request, Response, fetch_fn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let network = fetch_fn(|_request: Request| async { Ok(Response::ok("hello")) });
/// let response = network
///     .fetch(Request::parse("https://example.com/").unwrap())
///     .await
///     .unwrap();
/// assert_eq!(response.text(), "hello");
/// # }
/// ```
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Sends `request` and resolves with the network response.
    async fn fetch(&self, request: Request) -> Result<Response, FetchError>;
}

#[async_trait]
impl<T> Fetch for Arc<T>
where
    T: Fetch + ?Sized,
{
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        (**self).fetch(request).await
    }
}

#[async_trait]
impl<T> Fetch for Box<T>
where
    T: Fetch + ?Sized,
{
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        (**self).fetch(request).await
    }
}

/// [`Fetch`] implementation backed by an async closure. See [`fetch_fn`].
#[derive(Clone)]
pub struct FetchFn<F> {
    f: F,
}

impl<F> fmt::Debug for FetchFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchFn").finish_non_exhaustive()
    }
}

/// Adapts an async closure into a [`Fetch`].
pub fn fetch_fn<F, Fut>(f: F) -> FetchFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, FetchError>> + Send,
{
    FetchFn { f }
}

#[async_trait]
impl<F, Fut> Fetch for FetchFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, FetchError>> + Send,
{
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        (self.f)(request).await
    }
}
