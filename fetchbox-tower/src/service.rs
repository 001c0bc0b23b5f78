use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use fetchbox::{FetchEvent, Router, Scope};
use fetchbox_core::{CacheStorage, Request};
use futures::FutureExt;
use http_body::Body as HttpBody;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use tower::{BoxError, Service};
use tracing::{debug, warn};

use crate::future::InterceptFuture;
use crate::upstream::TowerFetch;

/// Response body of [`InterceptService`].
pub type InterceptBody = UnsyncBoxBody<Bytes, BoxError>;

fn full(body: Bytes) -> InterceptBody {
    Full::new(body)
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// Tower service routing requests through a fetchbox [`Router`].
///
/// Request bodies are buffered. Routed requests are answered by their
/// handler; the inner service acts as the network. Requests no route applies
/// to are forwarded to the inner service unchanged.
pub struct InterceptService<S> {
    inner: S,
    router: Arc<Router>,
    caches: Arc<dyn CacheStorage>,
}

impl<S> InterceptService<S> {
    /// Creates a service routing through `router` with `caches` as storage.
    pub fn new(inner: S, router: Arc<Router>, caches: Arc<dyn CacheStorage>) -> Self {
        Self {
            inner,
            router,
            caches,
        }
    }
}

impl<S> Clone for InterceptService<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            router: self.router.clone(),
            caches: self.caches.clone(),
        }
    }
}

impl<S> fmt::Debug for InterceptService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptService")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

/// Copies the request head without its extensions.
fn copy_head(parts: &http::request::Parts) -> http::request::Parts {
    let mut copy = http::Request::new(());
    *copy.method_mut() = parts.method.clone();
    *copy.uri_mut() = parts.uri.clone();
    *copy.version_mut() = parts.version;
    *copy.headers_mut() = parts.headers.clone();
    copy.into_parts().0
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for InterceptService<S>
where
    S: Service<http::Request<Full<Bytes>>, Response = http::Response<ResBody>>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    ReqBody: HttpBody + Send + 'static,
    ReqBody::Data: Send,
    ReqBody::Error: Into<BoxError>,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = http::Response<InterceptBody>;
    type Error = BoxError;
    type Future = InterceptFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // the ready service answers passthrough requests, a fresh clone stays behind
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        InterceptFuture::new(
            intercept(inner, self.router.clone(), self.caches.clone(), req).boxed(),
        )
    }
}

async fn intercept<S, ReqBody, ResBody>(
    mut inner: S,
    router: Arc<Router>,
    caches: Arc<dyn CacheStorage>,
    req: http::Request<ReqBody>,
) -> Result<http::Response<InterceptBody>, BoxError>
where
    S: Service<http::Request<Full<Bytes>>, Response = http::Response<ResBody>>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    ReqBody: HttpBody + Send + 'static,
    ReqBody::Data: Send,
    ReqBody::Error: Into<BoxError>,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map_err(Into::<BoxError>::into)?
        .to_bytes();
    let request = Request::from_http(copy_head(&parts), body.clone(), router.origin())?;

    let scope = Scope::from_shared(caches, Arc::new(TowerFetch::new(inner.clone())));
    let event = FetchEvent::new(request, scope);

    let Some(routed) = router.handle(&event) else {
        debug!(uri = %parts.uri, "passing request through");
        let response = inner
            .call(http::Request::from_parts(parts, Full::new(body)))
            .await
            .map_err(Into::<BoxError>::into)?;
        return Ok(response.map(|body| body.map_err(Into::<BoxError>::into).boxed_unsync()));
    };

    let result = routed.await;
    tokio::spawn(async move {
        if let Err(error) = event.done().await {
            warn!(%error, "background work of intercepted request failed");
        }
    });
    let response = result?;
    Ok(response.into_http().map(full))
}
