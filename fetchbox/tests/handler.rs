mod common;

use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{MockFetch, Recorder, cached_text, event, request, seed};
use fetchbox::handler::REVISION_PARAM;
use fetchbox::plugin::{CacheKeyMode, HookContext, HookResult};
use fetchbox::strategy::CustomStrategy;
use fetchbox::{
    Error, HookKind, HookSet, Plugin, Request, RequestInfo, RequestMode, Response, Strategy,
    StrategyHandler, StrategyOptions,
};
use fetchbox_moka::MokaCacheStorage;
use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode};
use pretty_assertions::assert_eq;

const CACHE: &str = "handler-test";

fn options() -> StrategyOptions {
    StrategyOptions::default().cache_name(CACHE)
}

/// Runs an async closure against the handler of each request.
struct Script<F>(F);

#[async_trait]
impl<F, Fut> CustomStrategy for Script<F>
where
    F: Fn(StrategyHandler, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, Error>> + Send,
{
    fn name(&self) -> &str {
        "script"
    }

    async fn handle(&self, handler: &StrategyHandler, request: Request) -> Result<Response, Error> {
        (self.0)(handler.clone(), request).await
    }
}

/// Drops the query string from cache keys.
struct StripQuery;

#[async_trait]
impl Plugin for StripQuery {
    fn hooks(&self) -> HookSet {
        HookSet::from([HookKind::CacheKeyWillBeUsed])
    }

    async fn cache_key_will_be_used(
        &self,
        _ctx: HookContext<'_>,
        key: RequestInfo,
        _mode: CacheKeyMode,
    ) -> HookResult<RequestInfo> {
        let url = key.as_url_str();
        let stripped = url.split('?').next().unwrap_or(url).to_owned();
        Ok(RequestInfo::Url(stripped))
    }
}

struct RelativeKey;

#[async_trait]
impl Plugin for RelativeKey {
    fn hooks(&self) -> HookSet {
        HookSet::from([HookKind::CacheKeyWillBeUsed])
    }

    async fn cache_key_will_be_used(
        &self,
        _ctx: HookContext<'_>,
        _key: RequestInfo,
        _mode: CacheKeyMode,
    ) -> HookResult<RequestInfo> {
        Ok(RequestInfo::Url("cache/key".into()))
    }
}

struct VetoWrites;

#[async_trait]
impl Plugin for VetoWrites {
    fn hooks(&self) -> HookSet {
        HookSet::from([HookKind::CacheWillUpdate])
    }

    async fn cache_will_update(
        &self,
        _ctx: HookContext<'_>,
        _request: &Request,
        _response: Response,
    ) -> HookResult<Option<Response>> {
        Ok(None)
    }
}

struct DenyFetch;

#[async_trait]
impl Plugin for DenyFetch {
    fn hooks(&self) -> HookSet {
        HookSet::from([HookKind::RequestWillFetch])
    }

    async fn request_will_fetch(
        &self,
        _ctx: HookContext<'_>,
        _request: Request,
    ) -> HookResult<Request> {
        Err("offline mode".into())
    }
}

const CLIENT: HeaderName = HeaderName::from_static("x-client");

struct TagRequests;

#[async_trait]
impl Plugin for TagRequests {
    fn hooks(&self) -> HookSet {
        HookSet::from([HookKind::RequestWillFetch])
    }

    async fn request_will_fetch(
        &self,
        _ctx: HookContext<'_>,
        request: Request,
    ) -> HookResult<Request> {
        Ok(request.with_header(CLIENT, HeaderValue::from_static("fetchbox")))
    }
}

/// Keeps the replaced entry seen by `cacheDidUpdate`.
#[derive(Clone, Default)]
struct OldEntries(Arc<Mutex<Vec<Option<String>>>>);

#[async_trait]
impl Plugin for OldEntries {
    fn hooks(&self) -> HookSet {
        HookSet::from([HookKind::CacheDidUpdate])
    }

    async fn cache_did_update(
        &self,
        _ctx: HookContext<'_>,
        _cache_name: &str,
        _request: &Request,
        old_response: Option<&Response>,
        _new_response: &Response,
    ) -> HookResult<()> {
        self.0
            .lock()
            .unwrap()
            .push(old_response.map(Response::text));
        Ok(())
    }
}

const VISITS: HeaderName = HeaderName::from_static("x-visits");

#[derive(Clone, Copy)]
struct Visits(u32);

/// Counts hook calls in its per-request state.
struct CountVisits;

#[async_trait]
impl Plugin for CountVisits {
    fn hooks(&self) -> HookSet {
        HookSet::from([HookKind::HandlerWillStart, HookKind::HandlerWillRespond])
    }

    async fn handler_will_start(&self, ctx: HookContext<'_>) -> HookResult<()> {
        let Visits(seen) = ctx.state.get::<Visits>().unwrap_or(Visits(0));
        ctx.state.insert(Visits(seen + 1));
        Ok(())
    }

    async fn handler_will_respond(
        &self,
        ctx: HookContext<'_>,
        response: Response,
    ) -> HookResult<Response> {
        let Visits(seen) = ctx.state.get::<Visits>().unwrap_or(Visits(0));
        Ok(response.with_header(VISITS, HeaderValue::from(seen)))
    }
}

#[tokio::test]
async fn cache_key_hooks_run_once_per_mode() {
    let storage = MokaCacheStorage::new();
    let recorder = Recorder::only([HookKind::CacheKeyWillBeUsed]);
    let strategy = Strategy::custom(
        Script(|handler: StrategyHandler, request: Request| async move {
            handler.cache_match(request.clone()).await?;
            handler.cache_match(request.clone()).await?;
            handler.cache_put(request.clone(), Response::ok("one")).await?;
            handler.cache_put(request, Response::ok("two")).await?;
            Ok::<_, Error>(Response::ok("done"))
        }),
        options().plugin(recorder.clone()),
    );

    let page = request("/build/app.js");
    let event = event(page.clone(), &storage, &MockFetch::offline());
    assert_eq!(strategy.handle(event.clone()).await.unwrap().text(), "done");
    event.done().await.unwrap();

    assert_eq!(recorder.count(HookKind::CacheKeyWillBeUsed), 2);
    assert_eq!(cached_text(&storage, CACHE, &page).await.as_deref(), Some("two"));
    assert_eq!(strategy.kind().as_str(), "script");
}

#[tokio::test]
async fn cache_key_hook_rewrites_lookups() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fresh");
    seed(&storage, CACHE, &request("/build/app.js"), Response::ok("cached")).await;
    let strategy = Strategy::cache_first(options().plugin(StripQuery));

    let event = event(request("/build/app.js?v=3"), &storage, &network);
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.text(), "cached");
    assert_eq!(network.calls(), 0);
}

#[tokio::test]
async fn relative_string_cache_keys_are_rejected() {
    let storage = MokaCacheStorage::new();
    let strategy = Strategy::cache_only(options().plugin(RelativeKey));

    let event = event(request("/build/app.js"), &storage, &MockFetch::offline());
    let error = strategy.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();

    assert!(matches!(error, Error::UnsupportedCacheKeyType { key } if key == "cache/key"));
}

#[tokio::test]
async fn vetoed_writes_leave_the_cache_empty() {
    let storage = MokaCacheStorage::new();
    let page = request("/dashboard");

    let writer = Strategy::network_first(options().plugin(VetoWrites));
    let event = event(page.clone(), &storage, &MockFetch::ok("fresh"));
    assert_eq!(writer.handle(event.clone()).await.unwrap().text(), "fresh");
    event.done().await.unwrap();

    let reader = Strategy::cache_only(options());
    let event = common::event(page, &storage, &MockFetch::ok("fresh"));
    let error = reader.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();
    assert!(matches!(error, Error::CacheMiss { .. }));
}

#[tokio::test]
async fn request_will_fetch_failure_stops_the_fetch() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fresh");
    let strategy = Strategy::network_only(options().plugin(DenyFetch));

    let event = event(request("/api/items"), &storage, &network);
    let error = strategy.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();

    assert!(matches!(error, Error::PluginRequestTransform(_)));
    assert_eq!(network.calls(), 0);
}

#[tokio::test]
async fn request_will_fetch_rewrites_the_request() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fresh");
    let strategy = Strategy::network_only(options().plugin(TagRequests));

    let event = event(request("/api/items"), &storage, &network);
    strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(network.seen()[0].headers()[&CLIENT], "fetchbox");
}

#[tokio::test]
async fn cache_did_update_sees_entry_of_previous_revision() {
    common::init_tracing();
    let storage = MokaCacheStorage::new();
    let old_entries = OldEntries::default();
    let previous = request(&format!("/build/app.js?{REVISION_PARAM}=1"));
    seed(&storage, CACHE, &previous, Response::ok("v1")).await;

    let strategy = Strategy::custom(
        Script(|handler: StrategyHandler, request: Request| async move {
            let stored = handler.cache_put(request, Response::ok("v2")).await?;
            Ok::<_, Error>(Response::ok(stored.to_string()))
        }),
        options().plugin(old_entries.clone()),
    );

    let current = request(&format!("/build/app.js?{REVISION_PARAM}=2"));
    let event = event(current, &storage, &MockFetch::offline());
    assert_eq!(strategy.handle(event.clone()).await.unwrap().text(), "true");
    event.done().await.unwrap();

    assert_eq!(*old_entries.0.lock().unwrap(), vec![Some("v1".to_owned())]);
}

#[tokio::test]
async fn non_get_writes_fail_only_in_strict_mode() {
    let storage = MokaCacheStorage::new();
    let script = || {
        Script(|handler: StrategyHandler, request: Request| async move {
            let stored = handler
                .cache_put(request.with_method(Method::POST), Response::ok("body"))
                .await?;
            Ok::<_, Error>(Response::ok(stored.to_string()))
        })
    };

    let strict = Strategy::custom(script(), options().strict(true));
    let event = event(request("/api/items"), &storage, &MockFetch::offline());
    let error = strict.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();
    assert!(matches!(error, Error::NonGetCacheWrite { method, .. } if method == Method::POST));

    let lenient = Strategy::custom(script(), options().strict(false));
    let event = common::event(request("/api/items"), &storage, &MockFetch::offline());
    assert_eq!(lenient.handle(event.clone()).await.unwrap().text(), "false");
    event.done().await.unwrap();
}

#[tokio::test]
async fn quota_errors_surface_from_cache_put() {
    let storage = MokaCacheStorage::builder().max_entry_bytes(4).build();
    let strategy = Strategy::custom(
        Script(|handler: StrategyHandler, request: Request| async move {
            handler.cache_put(request, Response::ok("too large")).await?;
            Ok::<_, Error>(Response::ok("stored"))
        }),
        options(),
    );

    let page = request("/build/app.js");
    let event = event(page.clone(), &storage, &MockFetch::offline());
    let error = strategy.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();

    assert!(matches!(error, Error::QuotaExceeded { url } if url.ends_with("/build/app.js")));
    assert_eq!(cached_text(&storage, CACHE, &page).await, None);
}

#[tokio::test]
async fn navigations_use_the_preload_response() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fetched");
    let strategy = Strategy::network_first(options());

    let navigation = request("/dashboard").with_mode(RequestMode::Navigate);
    let event = event(navigation, &storage, &network)
        .with_preload_response(async { Some(Response::ok("preloaded")) });
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.text(), "preloaded");
    assert_eq!(network.calls(), 0);
}

#[tokio::test]
async fn empty_preload_falls_through_to_the_network() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fetched");
    let strategy = Strategy::network_first(options());

    let navigation = request("/dashboard").with_mode(RequestMode::Navigate);
    let event = event(navigation, &storage, &network).with_preload_response(async { None });
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.text(), "fetched");
    assert_eq!(network.calls(), 1);
}

#[tokio::test]
async fn plugin_state_is_scoped_to_one_request() {
    let storage = MokaCacheStorage::new();
    let strategy = Strategy::network_only(options().plugin(CountVisits));

    for _ in 0..2 {
        let event = event(request("/api/items"), &storage, &MockFetch::ok("fresh"));
        let response = strategy.handle(event.clone()).await.unwrap();
        event.done().await.unwrap();
        assert_eq!(response.headers()[&VISITS], "1");
    }
}

#[tokio::test]
async fn cacheable_plugin_allows_listed_statuses() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::responding(Response::new(StatusCode::NOT_FOUND, "gone"));
    let page = request("/missing");
    let strategy = Strategy::network_first(options().plugin(
        fetchbox::plugin::CacheableResponsePlugin::new()
            .statuses([StatusCode::OK, StatusCode::NOT_FOUND]),
    ));

    let event = event(page.clone(), &storage, &network);
    strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(cached_text(&storage, CACHE, &page).await.as_deref(), Some("gone"));
}
