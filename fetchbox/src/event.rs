//! Intercepted request events and the host capabilities they carry.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use fetchbox_core::{CacheStorage, Fetch, Request, Response};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use smol_str::SmolStr;

use crate::error::Error;
use crate::keep_alive::KeepAlive;

/// Host capabilities available while handling a request.
#[derive(Clone)]
pub struct Scope {
    caches: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetch>,
}

impl Scope {
    /// Creates a scope from a cache storage and a network client.
    pub fn new<C, F>(caches: C, fetcher: F) -> Self
    where
        C: CacheStorage + 'static,
        F: Fetch + 'static,
    {
        Self {
            caches: Arc::new(caches),
            fetcher: Arc::new(fetcher),
        }
    }

    /// Creates a scope from shared capabilities.
    pub fn from_shared(caches: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetch>) -> Self {
        Self { caches, fetcher }
    }

    /// Replaces the network client.
    pub fn with_fetcher<F>(self, fetcher: F) -> Self
    where
        F: Fetch + 'static,
    {
        Self {
            fetcher: Arc::new(fetcher),
            ..self
        }
    }

    /// Cache storage.
    pub fn caches(&self) -> &Arc<dyn CacheStorage> {
        &self.caches
    }

    /// Network client.
    pub fn fetcher(&self) -> &Arc<dyn Fetch> {
        &self.fetcher
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").finish_non_exhaustive()
    }
}

type Preload = Shared<BoxFuture<'static, Option<Response>>>;

#[derive(Clone)]
struct EventInner {
    request: Request,
    scope: Scope,
    preload: Option<Preload>,
    keep_alive: KeepAlive,
}

/// An intercepted request together with its scope and background work.
///
/// Cloning is cheap and clones share the background work queue.
#[derive(Clone)]
pub struct FetchEvent {
    inner: Arc<EventInner>,
}

impl FetchEvent {
    /// Creates an event for `request`.
    pub fn new(request: Request, scope: Scope) -> Self {
        Self {
            inner: Arc::new(EventInner {
                request,
                scope,
                preload: None,
                keep_alive: KeepAlive::new(),
            }),
        }
    }

    /// Attaches a speculatively started navigation response.
    pub fn with_preload_response<F>(mut self, preload: F) -> Self
    where
        F: Future<Output = Option<Response>> + Send + 'static,
    {
        Arc::make_mut(&mut self.inner).preload = Some(preload.boxed().shared());
        self
    }

    /// The intercepted request.
    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    /// Host capabilities.
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// Resolves the preload response, if one was attached and produced a response.
    pub async fn preload_response(&self) -> Option<Response> {
        match &self.inner.preload {
            Some(preload) => preload.clone().await,
            None => None,
        }
    }

    /// Keeps the event alive until `task` finishes.
    pub fn wait_until<F>(&self, kind: impl Into<SmolStr>, task: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.inner.keep_alive.wait_until(kind, task);
    }

    /// Number of background tasks not drained yet.
    pub fn pending(&self) -> usize {
        self.inner.keep_alive.pending()
    }

    /// Awaits all background work registered on the event.
    pub async fn done(&self) -> Result<(), Error> {
        self.inner.keep_alive.done_waiting().await
    }
}

impl fmt::Debug for FetchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchEvent")
            .field("request", &self.inner.request)
            .field("preload", &self.inner.preload.is_some())
            .field("pending", &self.pending())
            .finish()
    }
}
