use std::sync::Arc;

use fetchbox::Router;
use fetchbox_core::CacheStorage;
use tower::Layer;

use crate::service::InterceptService;

/// Tower layer routing requests through a fetchbox [`Router`].
///
/// Use [`Intercept::builder`] to construct it.
#[derive(Clone)]
pub struct Intercept {
    router: Arc<Router>,
    caches: Arc<dyn CacheStorage>,
}

impl Intercept {
    /// Creates a layer from a router and a cache storage.
    pub fn new<C>(router: Router, caches: C) -> Self
    where
        C: CacheStorage + 'static,
    {
        Self {
            router: Arc::new(router),
            caches: Arc::new(caches),
        }
    }

    /// Creates a builder.
    pub fn builder() -> InterceptBuilder<NotSet, NotSet> {
        InterceptBuilder {
            router: NotSet,
            caches: NotSet,
        }
    }

    /// The router requests go through.
    pub fn router(&self) -> &Router {
        &self.router
    }
}

impl std::fmt::Debug for Intercept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Intercept")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for Intercept {
    type Service = InterceptService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptService::new(inner, Arc::clone(&self.router), Arc::clone(&self.caches))
    }
}

/// Marker for a builder field that has not been set yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotSet;

/// Builder for [`Intercept`].
///
/// `build` becomes available once both the router and the cache storage are set.
#[derive(Debug)]
pub struct InterceptBuilder<R, C> {
    router: R,
    caches: C,
}

impl<R, C> InterceptBuilder<R, C> {
    /// Sets the router.
    pub fn router(self, router: Router) -> InterceptBuilder<Router, C> {
        InterceptBuilder {
            router,
            caches: self.caches,
        }
    }

    /// Sets the cache storage strategies read from and write to.
    pub fn caches<NC>(self, caches: NC) -> InterceptBuilder<R, NC>
    where
        NC: CacheStorage + 'static,
    {
        InterceptBuilder {
            router: self.router,
            caches,
        }
    }
}

impl<C> InterceptBuilder<Router, C>
where
    C: CacheStorage + 'static,
{
    /// Builds the layer.
    pub fn build(self) -> Intercept {
        Intercept::new(self.router, self.caches)
    }
}
