//! Caching strategies.
//!
//! A [`Strategy`] is one of four fixed orderings of cache and network access,
//! or a custom policy:
//!
//! | Kind | Reads | On network failure |
//! |------|-------|--------------------|
//! | [`CacheFirst`](StrategyKind::CacheFirst) | cache, then network (written through) | `404 Not found` |
//! | [`NetworkFirst`](StrategyKind::NetworkFirst) | network with timeout (written through), then cache | synthetic `500` |
//! | [`NetworkOnly`](StrategyKind::NetworkOnly) | network with timeout | error |
//! | [`CacheOnly`](StrategyKind::CacheOnly) | cache | never touches the network |
//!
//! Every handled request gets its own [`StrategyHandler`] running the plugin
//! pipeline. [`Strategy::handle_all`] returns the response future together
//! with a [`Completion`] that resolves once all background work (cache writes)
//! and the final hooks are done.

mod cache_first;
mod cache_only;
mod network_first;
mod network_only;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use fetchbox_core::{MatchOptions, Request, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::ready;
use pin_project::pin_project;
use smol_str::SmolStr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Error;
use crate::event::FetchEvent;
use crate::handler::StrategyHandler;
use crate::metrics::record_network_failure;
use crate::plugin::{Plugin, PluginRegistry};
use crate::routing::{Handler, Params, RouteContext};

/// Cache used when no cache name is configured.
pub const DEFAULT_CACHE_NAME: &str = "fetchbox-runtime";

/// Network timeout used when none is configured.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// User supplied caching policy.
#[async_trait]
pub trait CustomStrategy: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str {
        "custom"
    }

    /// Produces the response for `request` using `handler`.
    async fn handle(&self, handler: &StrategyHandler, request: Request) -> Result<Response, Error>;
}

/// The policy a [`Strategy`] runs.
#[derive(Clone)]
pub enum StrategyKind {
    /// Cache, falling back to the network.
    CacheFirst,
    /// Network, falling back to the cache.
    NetworkFirst,
    /// Network only.
    NetworkOnly,
    /// Cache only.
    CacheOnly,
    /// User supplied policy.
    Custom(Arc<dyn CustomStrategy>),
}

impl StrategyKind {
    /// Name used in logs and metrics.
    pub fn as_str(&self) -> &str {
        match self {
            StrategyKind::CacheFirst => "cache_first",
            StrategyKind::NetworkFirst => "network_first",
            StrategyKind::NetworkOnly => "network_only",
            StrategyKind::CacheOnly => "cache_only",
            StrategyKind::Custom(custom) => custom.name(),
        }
    }

    async fn run(&self, handler: &StrategyHandler, request: Request) -> Result<Response, Error> {
        match self {
            StrategyKind::CacheFirst => cache_first::handle(handler, request).await,
            StrategyKind::NetworkFirst => network_first::handle(handler, request).await,
            StrategyKind::NetworkOnly => network_only::handle(handler, request).await,
            StrategyKind::CacheOnly => cache_only::handle(handler, request).await,
            StrategyKind::Custom(custom) => custom.handle(handler, request).await,
        }
    }
}

impl fmt::Debug for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options shared by every strategy.
///
/// ```
/// use std::time::Duration;
/// use fetchbox::plugin::CacheableResponsePlugin;
/// use fetchbox::strategy::{Strategy, StrategyOptions};
/// use http::StatusCode;
///
/// let strategy = Strategy::network_first(
///     StrategyOptions::default()
///         .cache_name("pages")
///         .network_timeout(Duration::from_secs(3))
///         .plugin(CacheableResponsePlugin::new().status(StatusCode::OK)),
/// );
/// assert_eq!(strategy.cache_name(), "pages");
/// ```
#[derive(Clone)]
pub struct StrategyOptions {
    cache_name: Option<SmolStr>,
    plugins: Vec<Arc<dyn Plugin>>,
    match_options: MatchOptions,
    network_timeout: Option<Duration>,
    loader: bool,
    strict: bool,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            cache_name: None,
            plugins: Vec::new(),
            match_options: MatchOptions::default(),
            network_timeout: None,
            loader: false,
            strict: cfg!(debug_assertions),
        }
    }
}

impl StrategyOptions {
    /// Cache to read from and write to.
    pub fn cache_name(self, cache_name: impl Into<SmolStr>) -> Self {
        Self {
            cache_name: Some(cache_name.into()),
            ..self
        }
    }

    /// Appends a plugin.
    pub fn plugin<P>(mut self, plugin: P) -> Self
    where
        P: Plugin + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Appends shared plugins.
    pub fn plugins(mut self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Match options for cache lookups.
    pub fn match_options(self, match_options: MatchOptions) -> Self {
        Self {
            match_options,
            ..self
        }
    }

    /// Network timeout. Zero means the default.
    pub fn network_timeout(self, network_timeout: Duration) -> Self {
        Self {
            network_timeout: Some(network_timeout),
            ..self
        }
    }

    /// Serve data requests: cache hits are marked and misses answered with JSON payloads.
    pub fn loader(self, loader: bool) -> Self {
        Self { loader, ..self }
    }

    /// Fail instead of skipping non-`GET` cache writes.
    pub fn strict(self, strict: bool) -> Self {
        Self { strict, ..self }
    }
}

pub(crate) struct StrategyShared {
    pub(crate) kind: StrategyKind,
    pub(crate) cache_name: SmolStr,
    pub(crate) registry: PluginRegistry,
    pub(crate) match_options: MatchOptions,
    pub(crate) network_timeout: Duration,
    pub(crate) loader: bool,
    pub(crate) strict: bool,
}

/// What a strategy handles: the event, the request and route params.
#[derive(Debug, Clone)]
pub struct HandleOptions {
    /// Event the request came from.
    pub event: FetchEvent,
    /// Request to handle.
    pub request: Request,
    /// Route params.
    pub params: Option<Params>,
}

impl HandleOptions {
    /// Handles the event's own request.
    pub fn new(event: FetchEvent) -> Self {
        Self {
            request: event.request().clone(),
            event,
            params: None,
        }
    }

    /// Handles `request` instead of the event's request.
    pub fn request(self, request: Request) -> Self {
        Self { request, ..self }
    }

    /// Sets route params.
    pub fn params(self, params: Params) -> Self {
        Self {
            params: Some(params),
            ..self
        }
    }
}

impl From<FetchEvent> for HandleOptions {
    fn from(event: FetchEvent) -> Self {
        HandleOptions::new(event)
    }
}

impl From<RouteContext> for HandleOptions {
    fn from(ctx: RouteContext) -> Self {
        Self {
            event: ctx.event,
            request: ctx.request,
            params: ctx.params,
        }
    }
}

/// Resolves once a handled request is fully settled.
///
/// Settled means `handlerDidRespond` ran, background work of the handler was
/// drained and `handlerDidComplete` ran. The work runs whether or not the
/// completion is awaited.
#[pin_project]
pub struct Completion {
    #[pin]
    handle: JoinHandle<Result<(), Error>>,
}

impl Completion {
    fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(task),
        }
    }
}

impl Future for Completion {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match ready!(this.handle.poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(join_error) => Poll::Ready(Err(Error::BackgroundTask(join_error))),
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

/// A configured caching strategy. Cheap to clone.
#[derive(Clone)]
pub struct Strategy {
    shared: Arc<StrategyShared>,
}

impl Strategy {
    /// Creates a strategy of `kind`.
    pub fn new(kind: StrategyKind, options: StrategyOptions) -> Self {
        let network_timeout = options
            .network_timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_NETWORK_TIMEOUT);
        Self {
            shared: Arc::new(StrategyShared {
                kind,
                cache_name: options
                    .cache_name
                    .unwrap_or_else(|| SmolStr::new_static(DEFAULT_CACHE_NAME)),
                registry: PluginRegistry::new(options.plugins),
                match_options: options.match_options,
                network_timeout,
                loader: options.loader,
                strict: options.strict,
            }),
        }
    }

    /// [`StrategyKind::CacheFirst`].
    pub fn cache_first(options: StrategyOptions) -> Self {
        Self::new(StrategyKind::CacheFirst, options)
    }

    /// [`StrategyKind::NetworkFirst`].
    pub fn network_first(options: StrategyOptions) -> Self {
        Self::new(StrategyKind::NetworkFirst, options)
    }

    /// [`StrategyKind::NetworkOnly`].
    pub fn network_only(options: StrategyOptions) -> Self {
        Self::new(StrategyKind::NetworkOnly, options)
    }

    /// [`StrategyKind::CacheOnly`].
    pub fn cache_only(options: StrategyOptions) -> Self {
        Self::new(StrategyKind::CacheOnly, options)
    }

    /// [`StrategyKind::Custom`].
    pub fn custom<S>(strategy: S, options: StrategyOptions) -> Self
    where
        S: CustomStrategy + 'static,
    {
        Self::new(StrategyKind::Custom(Arc::new(strategy)), options)
    }

    /// Policy of this strategy.
    pub fn kind(&self) -> &StrategyKind {
        &self.shared.kind
    }

    /// Cache the strategy reads from and writes to.
    pub fn cache_name(&self) -> &str {
        &self.shared.cache_name
    }

    /// Effective network timeout.
    pub fn network_timeout(&self) -> Duration {
        self.shared.network_timeout
    }

    /// Plugins of the strategy.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.shared.registry
    }

    /// Starts handling a request.
    ///
    /// Returns the response future and the [`Completion`] of the handler.
    pub fn handle_all(
        &self,
        options: impl Into<HandleOptions>,
    ) -> (BoxFuture<'static, Result<Response, Error>>, Completion) {
        let HandleOptions {
            event,
            request,
            params,
        } = options.into();
        let handler = StrategyHandler::new(self.shared.clone(), event, request.clone(), params);
        let (response_tx, response_rx) = oneshot::channel::<Option<Response>>();

        let shared = self.shared.clone();
        let response_handler = handler.clone();
        let response = async move {
            let result = get_response(&shared, &response_handler, request).await;
            // the completion task may already be gone if the runtime shuts down
            let _ = response_tx.send(result.as_ref().ok().cloned());
            result
        }
        .boxed();

        let completion = Completion::spawn(async move {
            let response = response_rx.await.ok().flatten();
            let waited = async {
                handler.handler_did_respond(response.as_ref()).await?;
                handler.done_waiting().await
            }
            .await;
            handler
                .handler_did_complete(response.as_ref(), waited.as_ref().err())
                .await?;
            waited
        });

        (response, completion)
    }

    /// Handles a request, keeping the event alive until the handler completes.
    pub async fn handle(&self, options: impl Into<HandleOptions>) -> Result<Response, Error> {
        let options = options.into();
        let event = options.event.clone();
        let (response, completion) = self.handle_all(options);
        event.wait_until(self.shared.kind.as_str().to_owned(), completion);
        response.await
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("kind", &self.shared.kind)
            .field("cache_name", &self.shared.cache_name)
            .field("plugins", &self.shared.registry)
            .field("match_options", &self.shared.match_options)
            .field("network_timeout", &self.shared.network_timeout)
            .field("loader", &self.shared.loader)
            .finish()
    }
}

#[async_trait]
impl Handler for Strategy {
    async fn handle(&self, ctx: RouteContext) -> Result<Response, Error> {
        Strategy::handle(self, ctx).await
    }
}

async fn get_response(
    shared: &StrategyShared,
    handler: &StrategyHandler,
    request: Request,
) -> Result<Response, Error> {
    if !request.is_http() {
        return Err(Error::NotHttpRequest {
            url: request.url().to_string(),
        });
    }
    handler.handler_will_start().await?;

    let url = request.url().to_string();
    let outcome = match shared.kind.run(handler, request).await {
        Ok(response) if !response.is_usable() => Err(Error::UnusableResponse { url }),
        other => other,
    };

    let response = match outcome {
        Ok(response) => response,
        Err(error) => match handler.handler_did_error(&error).await? {
            Some(response) => {
                debug!(%error, strategy = shared.kind.as_str(), "recovered by handlerDidError");
                response
            }
            None => return Err(error),
        },
    };
    handler.handler_will_respond(response).await
}

/// Fetches `request`, racing the network call against `timeout` when one is given.
///
/// When `cache_put` is set, only a response that won the race is written to
/// the cache, as background work of the handler.
pub(crate) async fn fetch_with_timeout(
    handler: &StrategyHandler,
    request: Request,
    timeout: Option<Duration>,
    cache_put: bool,
) -> Result<Response, Error> {
    let result = handler.fetch_within(request.clone(), timeout).await;
    match &result {
        Ok(response) if cache_put => handler.put_in_background(request, response.clone()),
        Ok(_) => {}
        Err(Error::NetworkTimeout { .. }) => record_network_failure(handler.strategy_name(), true),
        Err(Error::NetworkFailure(_)) => record_network_failure(handler.strategy_name(), false),
        Err(_) => {}
    }
    result
}
