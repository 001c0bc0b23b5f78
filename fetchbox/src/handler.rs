//! Per-request execution context of a strategy.
//!
//! A [`StrategyHandler`] is created for every request a strategy handles. It
//! performs network fetches and cache reads and writes on behalf of the
//! strategy, runs the plugin hooks around each of them, memoizes effective
//! cache keys and tracks background work.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use fetchbox_core::{
    CacheHandle, MatchOptions, MultiMatchOptions, Request, RequestInfo, Response, StoreError,
};
use http::Method;
use smol_str::SmolStr;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::event::FetchEvent;
use crate::keep_alive::KeepAlive;
use crate::metrics::{WriteOutcome, record_cache_write};
use crate::plugin::{CacheKeyMode, HookContext, HookKind, Plugin, PluginState};
use crate::routing::Params;
use crate::strategy::StrategyShared;

/// Search parameter ignored when looking up the entry replaced by a cache write.
pub const REVISION_PARAM: &str = "__FB_REVISION__";

struct HandlerInner {
    shared: Arc<StrategyShared>,
    event: FetchEvent,
    request: Request,
    params: Option<Params>,
    cache_keys: DashMap<(String, CacheKeyMode), Arc<OnceCell<Request>>>,
    states: Vec<PluginState>,
    keep_alive: KeepAlive,
}

/// Execution context for one request handled by a strategy.
///
/// Cloning is cheap; clones share memoized keys, plugin state and background work.
#[derive(Clone)]
pub struct StrategyHandler {
    inner: Arc<HandlerInner>,
}

fn to_request(input: RequestInfo) -> Result<Request, Error> {
    match input {
        RequestInfo::Request(request) => Ok(request),
        RequestInfo::Url(url) => Request::parse(&url).map_err(|source| Error::InvalidUrl {
            input: url,
            source,
        }),
    }
}

impl StrategyHandler {
    pub(crate) fn new(
        shared: Arc<StrategyShared>,
        event: FetchEvent,
        request: Request,
        params: Option<Params>,
    ) -> Self {
        let states = (0..shared.registry.len())
            .map(|_| PluginState::new())
            .collect();
        Self {
            inner: Arc::new(HandlerInner {
                shared,
                event,
                request,
                params,
                cache_keys: DashMap::new(),
                states,
                keep_alive: KeepAlive::new(),
            }),
        }
    }

    /// Request being handled.
    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    /// Event the request came from.
    pub fn event(&self) -> &FetchEvent {
        &self.inner.event
    }

    /// Route params.
    pub fn params(&self) -> Option<&Params> {
        self.inner.params.as_ref()
    }

    /// Name of the cache the strategy uses.
    pub fn cache_name(&self) -> &str {
        &self.inner.shared.cache_name
    }

    /// Match options for cache lookups.
    pub fn match_options(&self) -> MatchOptions {
        self.inner.shared.match_options
    }

    /// Network timeout configured on the strategy.
    pub fn network_timeout(&self) -> Duration {
        self.inner.shared.network_timeout
    }

    /// Whether the strategy serves data requests.
    pub fn is_loader(&self) -> bool {
        self.inner.shared.loader
    }

    pub(crate) fn strategy_name(&self) -> &str {
        self.inner.shared.kind.as_str()
    }

    /// Whether any plugin implements `hook`.
    pub fn has_callback(&self, hook: HookKind) -> bool {
        self.inner.shared.registry.has(hook)
    }

    fn hook_indices(&self, hook: HookKind) -> &[usize] {
        self.inner.shared.registry.indices(hook)
    }

    /// Plugin at `index` with its hook context for this request.
    fn callback(&self, index: usize) -> (&Arc<dyn Plugin>, HookContext<'_>) {
        let ctx = HookContext {
            request: &self.inner.request,
            event: &self.inner.event,
            params: self.inner.params.as_ref(),
            state: &self.inner.states[index],
        };
        (&self.inner.shared.registry.plugins()[index], ctx)
    }

    /// Sends `input` to the network.
    ///
    /// Navigations are answered by the event's preload response when one is
    /// available. Otherwise `requestWillFetch` hooks may replace the request,
    /// and `fetchDidSucceed` or `fetchDidFail` hooks run on the outcome.
    pub async fn fetch(&self, input: impl Into<RequestInfo>) -> Result<Response, Error> {
        self.fetch_within(input, None).await
    }

    /// Like [`fetch`](Self::fetch), racing the network call against `timeout`.
    ///
    /// Only the network call is raced. When it loses, it keeps running
    /// detached and its outcome is dropped without running any hook.
    pub(crate) async fn fetch_within(
        &self,
        input: impl Into<RequestInfo>,
        timeout: Option<Duration>,
    ) -> Result<Response, Error> {
        let original = to_request(input.into())?;

        if original.is_navigation() {
            if let Some(response) = self.event().preload_response().await {
                debug!(url = %original.url(), "using preload response");
                return Ok(response);
            }
        }

        let mut request = original.clone();
        for &index in self.hook_indices(HookKind::RequestWillFetch) {
            let (plugin, ctx) = self.callback(index);
            request = plugin
                .request_will_fetch(ctx, request)
                .await
                .map_err(Error::PluginRequestTransform)?;
        }

        let fetcher = self.event().scope().fetcher().clone();
        let outcome = match timeout {
            None => fetcher.fetch(request.clone()).await.map_err(Error::from),
            Some(timeout) => {
                let network = {
                    let request = request.clone();
                    tokio::spawn(async move { fetcher.fetch(request).await })
                };
                match tokio::time::timeout(timeout, network).await {
                    Ok(Ok(result)) => result.map_err(Error::from),
                    Ok(Err(join_error)) => Err(Error::BackgroundTask(join_error)),
                    Err(_elapsed) => {
                        debug!(url = %request.url(), ?timeout, "network request timed out");
                        Err(Error::NetworkTimeout {
                            url: request.url().to_string(),
                            timeout,
                        })
                    }
                }
            }
        };
        let outcome = match outcome {
            Ok(response) if !response.is_usable() => Err(Error::NetworkFailure(
                fetchbox_core::FetchError::Unusable {
                    url: request.url().to_string(),
                },
            )),
            other => other,
        };

        match outcome {
            Ok(mut response) => {
                debug!(url = %request.url(), status = %response.status(), "network response");
                for &index in self.hook_indices(HookKind::FetchDidSucceed) {
                    let (plugin, ctx) = self.callback(index);
                    response = plugin
                        .fetch_did_succeed(ctx, &request, response)
                        .await
                        .map_err(|source| plugin_error(plugin, HookKind::FetchDidSucceed, source))?;
                }
                Ok(response)
            }
            Err(error) => {
                debug!(url = %request.url(), %error, "network request failed");
                self.fetch_did_fail(&original, &request, &error).await?;
                Err(error)
            }
        }
    }

    /// Runs `fetchDidFail` hooks.
    pub async fn fetch_did_fail(
        &self,
        original: &Request,
        request: &Request,
        error: &Error,
    ) -> Result<(), Error> {
        for &index in self.hook_indices(HookKind::FetchDidFail) {
            let (plugin, ctx) = self.callback(index);
            plugin
                .fetch_did_fail(ctx, original, request, error)
                .await
                .map_err(|source| plugin_error(plugin, HookKind::FetchDidFail, source))?;
        }
        Ok(())
    }

    /// Fetches `input` and writes the response to the cache in the background.
    pub async fn fetch_and_cache_put(
        &self,
        input: impl Into<RequestInfo>,
    ) -> Result<Response, Error> {
        let request = to_request(input.into())?;
        let response = self.fetch(request.clone()).await?;
        self.put_in_background(request, response.clone());
        Ok(response)
    }

    /// Writes `response` for `request` to the cache as background work.
    pub(crate) fn put_in_background(&self, request: Request, response: Response) {
        let handler = self.clone();
        self.wait_until("cache_put", async move {
            handler.cache_put(request, response).await.map(|_| ())
        });
    }

    /// Looks `key` up in the strategy's cache.
    ///
    /// The key goes through `cacheKeyWillBeUsed` in read mode and the result
    /// through `cachedResponseWillBeUsed`.
    pub async fn cache_match(
        &self,
        key: impl Into<RequestInfo>,
    ) -> Result<Option<Response>, Error> {
        let request = to_request(key.into())?;
        let effective = self.cache_key(&request, CacheKeyMode::Read).await?;
        let options = MultiMatchOptions::in_cache(self.cache_name(), self.match_options());

        let mut cached = self
            .event()
            .scope()
            .caches()
            .match_request(&effective, options)
            .await?;
        match &cached {
            Some(_) => debug!(url = %effective.url(), cache = self.cache_name(), "cache hit"),
            None => debug!(url = %effective.url(), cache = self.cache_name(), "cache miss"),
        }

        for &index in self.hook_indices(HookKind::CachedResponseWillBeUsed) {
            let (plugin, ctx) = self.callback(index);
            cached = plugin
                .cached_response_will_be_used(ctx, self.cache_name(), &effective, cached)
                .await
                .map_err(|source| {
                    plugin_error(plugin, HookKind::CachedResponseWillBeUsed, source)
                })?;
        }
        Ok(cached)
    }

    /// Writes `response` to the strategy's cache under `key`.
    ///
    /// Returns `Ok(false)` when the write was skipped or vetoed. Non-http(s)
    /// keys are skipped. Non-`GET` keys fail in strict mode and are skipped
    /// otherwise. Quota failures are logged and returned.
    pub async fn cache_put(
        &self,
        key: impl Into<RequestInfo>,
        response: Response,
    ) -> Result<bool, Error> {
        let request = to_request(key.into())?;
        if !request.is_http() {
            debug!(url = %request.url(), "not caching non http(s) request");
            record_cache_write(WriteOutcome::Skipped);
            return Ok(false);
        }

        tokio::task::yield_now().await;
        let effective = self.cache_key(&request, CacheKeyMode::Write).await?;

        if effective.method() != Method::GET {
            record_cache_write(WriteOutcome::Skipped);
            if self.inner.shared.strict {
                return Err(Error::NonGetCacheWrite {
                    method: effective.method().clone(),
                    url: effective.url().to_string(),
                });
            }
            warn!(method = %effective.method(), url = %effective.url(), "not caching non-GET request");
            return Ok(false);
        }
        if !response.is_usable() {
            return Err(Error::UnusableResponse {
                url: effective.url().to_string(),
            });
        }

        let Some(response) = self.ensure_response_safe_to_cache(&effective, response).await? else {
            debug!(url = %effective.url(), "cache write vetoed");
            record_cache_write(WriteOutcome::Vetoed);
            return Ok(false);
        };

        let cache = self
            .event()
            .scope()
            .caches()
            .open(self.cache_name())
            .await?;
        let old_response = if self.has_callback(HookKind::CacheDidUpdate) {
            cache_match_ignore_params(cache.as_ref(), &effective, self.match_options()).await?
        } else {
            None
        };

        match cache.put(&effective, response.clone()).await {
            Ok(()) => {}
            Err(StoreError::QuotaExceeded { url }) => {
                error!(%url, cache = self.cache_name(), "storage quota exceeded");
                record_cache_write(WriteOutcome::QuotaExceeded);
                return Err(Error::QuotaExceeded { url });
            }
            Err(store_error) => return Err(store_error.into()),
        }
        debug!(url = %effective.url(), cache = self.cache_name(), "cached response");
        record_cache_write(WriteOutcome::Stored);

        for &index in self.hook_indices(HookKind::CacheDidUpdate) {
            let (plugin, ctx) = self.callback(index);
            plugin
                .cache_did_update(
                    ctx,
                    self.cache_name(),
                    &effective,
                    old_response.as_ref(),
                    &response,
                )
                .await
                .map_err(|source| plugin_error(plugin, HookKind::CacheDidUpdate, source))?;
        }
        Ok(true)
    }

    /// Effective cache key of `request` for `mode`.
    ///
    /// `cacheKeyWillBeUsed` hooks are folded over the request once per URL
    /// and mode; later calls return the memoized key.
    pub async fn cache_key(&self, request: &Request, mode: CacheKeyMode) -> Result<Request, Error> {
        let cell = self
            .inner
            .cache_keys
            .entry((request.url().to_string(), mode))
            .or_default()
            .clone();
        let key = cell
            .get_or_try_init(|| self.resolve_cache_key(request.clone(), mode))
            .await?;
        Ok(key.clone())
    }

    async fn resolve_cache_key(&self, request: Request, mode: CacheKeyMode) -> Result<Request, Error> {
        let mut key = RequestInfo::Request(request);
        for &index in self.hook_indices(HookKind::CacheKeyWillBeUsed) {
            let (plugin, ctx) = self.callback(index);
            key = plugin
                .cache_key_will_be_used(ctx, key, mode)
                .await
                .map_err(|source| plugin_error(plugin, HookKind::CacheKeyWillBeUsed, source))?;
        }
        match key {
            RequestInfo::Request(request) => Ok(request),
            RequestInfo::Url(url) => Request::parse(&url)
                .map_err(|_| Error::UnsupportedCacheKeyType { key: url }),
        }
    }

    async fn ensure_response_safe_to_cache(
        &self,
        request: &Request,
        response: Response,
    ) -> Result<Option<Response>, Error> {
        if !self.has_callback(HookKind::CacheWillUpdate) {
            return Ok((response.status() == http::StatusCode::OK).then_some(response));
        }

        let mut candidate = Some(response);
        for &index in self.hook_indices(HookKind::CacheWillUpdate) {
            let (plugin, ctx) = self.callback(index);
            let Some(response) = candidate.take() else {
                break;
            };
            candidate = plugin
                .cache_will_update(ctx, request, response)
                .await
                .map_err(|source| plugin_error(plugin, HookKind::CacheWillUpdate, source))?;
        }
        Ok(candidate)
    }

    /// Keeps the handler alive until `task` finishes.
    pub fn wait_until<F>(&self, kind: impl Into<SmolStr>, task: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.inner.keep_alive.wait_until(kind, task);
    }

    /// Awaits all background work registered on the handler.
    pub async fn done_waiting(&self) -> Result<(), Error> {
        self.inner.keep_alive.done_waiting().await
    }

    pub(crate) async fn handler_will_start(&self) -> Result<(), Error> {
        for &index in self.hook_indices(HookKind::HandlerWillStart) {
            let (plugin, ctx) = self.callback(index);
            plugin
                .handler_will_start(ctx)
                .await
                .map_err(|source| plugin_error(plugin, HookKind::HandlerWillStart, source))?;
        }
        Ok(())
    }

    pub(crate) async fn handler_did_error(&self, error: &Error) -> Result<Option<Response>, Error> {
        for &index in self.hook_indices(HookKind::HandlerDidError) {
            let (plugin, ctx) = self.callback(index);
            let recovered = plugin
                .handler_did_error(ctx, error)
                .await
                .map_err(|source| plugin_error(plugin, HookKind::HandlerDidError, source))?;
            if recovered.is_some() {
                return Ok(recovered);
            }
        }
        Ok(None)
    }

    pub(crate) async fn handler_will_respond(&self, mut response: Response) -> Result<Response, Error> {
        for &index in self.hook_indices(HookKind::HandlerWillRespond) {
            let (plugin, ctx) = self.callback(index);
            response = plugin
                .handler_will_respond(ctx, response)
                .await
                .map_err(|source| plugin_error(plugin, HookKind::HandlerWillRespond, source))?;
        }
        Ok(response)
    }

    pub(crate) async fn handler_did_respond(&self, response: Option<&Response>) -> Result<(), Error> {
        for &index in self.hook_indices(HookKind::HandlerDidRespond) {
            let (plugin, ctx) = self.callback(index);
            plugin
                .handler_did_respond(ctx, response)
                .await
                .map_err(|source| plugin_error(plugin, HookKind::HandlerDidRespond, source))?;
        }
        Ok(())
    }

    pub(crate) async fn handler_did_complete(
        &self,
        response: Option<&Response>,
        error: Option<&Error>,
    ) -> Result<(), Error> {
        for &index in self.hook_indices(HookKind::HandlerDidComplete) {
            let (plugin, ctx) = self.callback(index);
            plugin
                .handler_did_complete(ctx, response, error)
                .await
                .map_err(|source| plugin_error(plugin, HookKind::HandlerDidComplete, source))?;
        }
        Ok(())
    }
}

impl fmt::Debug for StrategyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyHandler")
            .field("strategy", &self.strategy_name())
            .field("cache_name", &self.cache_name())
            .field("request", &self.inner.request)
            .field("pending", &self.inner.keep_alive.pending())
            .finish()
    }
}

fn plugin_error(plugin: &Arc<dyn Plugin>, hook: HookKind, source: fetchbox_core::BoxError) -> Error {
    Error::Plugin {
        plugin: plugin.name().to_owned(),
        hook,
        source,
    }
}

fn strip_param(url: &url::Url, param: &str) -> url::Url {
    let mut stripped = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != param)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// Finds the entry for `request` while ignoring the revision search parameter.
async fn cache_match_ignore_params(
    cache: &dyn CacheHandle,
    request: &Request,
    options: MatchOptions,
) -> Result<Option<Response>, StoreError> {
    let stripped = strip_param(request.url(), REVISION_PARAM);
    if &stripped == request.url() {
        return cache.match_request(request, options).await;
    }

    let candidates = cache
        .keys(Some(request), options.ignore_search(true))
        .await?;
    for candidate in candidates {
        if strip_param(candidate.url(), REVISION_PARAM) == stripped {
            return cache.match_request(&candidate, options).await;
        }
    }
    Ok(None)
}
