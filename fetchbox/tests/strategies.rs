mod common;

use std::time::Duration;

use common::{MockFetch, Recorder, cached_text, event, request, seed};
use fetchbox::plugin::LoaderPlugin;
use fetchbox::synthetic::{self, CATCH_HEADER};
use fetchbox::{Error, FetchError, HookKind, Request, Response, Strategy, StrategyOptions};
use fetchbox_moka::MokaCacheStorage;
use http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::time::Instant;

const CACHE: &str = "runtime-test";

fn options() -> StrategyOptions {
    StrategyOptions::default().cache_name(CACHE)
}

#[tokio::test]
async fn cache_first_serves_cached_entries_without_network() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fresh");
    let page = request("/build/app.js");
    seed(&storage, CACHE, &page, Response::ok("cached")).await;

    let strategy = Strategy::cache_first(options());
    for _ in 0..3 {
        let event = event(page.clone(), &storage, &network);
        let response = strategy.handle(event.clone()).await.unwrap();
        event.done().await.unwrap();
        assert_eq!(response.text(), "cached");
        assert!(!synthetic::is_marked(&response));
    }
    assert_eq!(network.calls(), 0);
}

#[tokio::test]
async fn cache_first_writes_through_on_miss() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fresh");
    let page = request("/build/app.js");
    let strategy = Strategy::cache_first(options());

    let event = event(page.clone(), &storage, &network);
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();
    assert_eq!(response.text(), "fresh");
    assert_eq!(cached_text(&storage, CACHE, &page).await.as_deref(), Some("fresh"));

    let event = common::event(page.clone(), &storage, &network);
    strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();
    assert_eq!(network.calls(), 1);
}

#[tokio::test]
async fn cache_first_offline_miss_is_not_found() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::offline();
    let recorder = Recorder::only([HookKind::FetchDidFail]);
    let strategy = Strategy::cache_first(options().plugin(recorder.clone()));

    let event = event(request("/build/app.js"), &storage, &network);
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "Not found");
    assert_eq!(recorder.count(HookKind::FetchDidFail), 1);
}

#[tokio::test]
async fn cache_first_loader_miss_is_network_error() {
    let storage = MokaCacheStorage::new();
    let strategy = Strategy::cache_first(options().loader(true));

    let event = event(request("/?_data=root"), &storage, &MockFetch::offline());
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[&CATCH_HEADER], "yes");
}

#[tokio::test]
async fn network_first_prefers_network_and_caches() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fresh");
    let page = request("/dashboard");
    seed(&storage, CACHE, &page, Response::ok("stale")).await;

    let strategy = Strategy::network_first(options());
    let event = event(page.clone(), &storage, &network);
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.text(), "fresh");
    assert!(!synthetic::is_marked(&response));
    assert_eq!(cached_text(&storage, CACHE, &page).await.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn network_first_falls_back_to_marked_cache_entry() {
    let storage = MokaCacheStorage::new();
    let page = request("/dashboard");
    seed(&storage, CACHE, &page, Response::ok("stale")).await;

    let strategy = Strategy::network_first(options());
    let event = event(page, &storage, &MockFetch::offline());
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.text(), "stale");
    assert!(synthetic::is_marked(&response));
}

#[tokio::test]
async fn network_first_synthesizes_network_error_without_cache() {
    let storage = MokaCacheStorage::new();
    let strategy = Strategy::network_first(options());

    let event = event(request("/dashboard"), &storage, &MockFetch::offline());
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[&CATCH_HEADER], "yes");
    let body: Value = response.json_body().unwrap();
    assert_eq!(body, json!({"message": "Network Error"}));
}

#[tokio::test]
async fn network_first_times_out_to_the_cache() {
    common::init_tracing();
    let storage = MokaCacheStorage::new();
    let page = request("/dashboard");
    seed(&storage, CACHE, &page, Response::ok("stale")).await;
    let recorder = Recorder::only([HookKind::FetchDidFail]);
    let strategy = Strategy::network_first(
        options()
            .network_timeout(Duration::from_millis(200))
            .plugin(recorder.clone()),
    );

    let started = Instant::now();
    let event = event(page, &storage, &MockFetch::hanging());
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(response.text(), "stale");
    assert_eq!(recorder.count(HookKind::FetchDidFail), 1);
}

#[tokio::test]
async fn late_network_response_is_discarded() {
    let storage = MokaCacheStorage::new();
    let page = request("/dashboard");
    let network = MockFetch::delayed("late", Duration::from_millis(300));
    let recorder = Recorder::new();
    let strategy = Strategy::network_first(
        options()
            .network_timeout(Duration::from_millis(100))
            .plugin(recorder.clone()),
    );

    let event = event(page.clone(), &storage, &network);
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(network.calls(), 1);
    assert_eq!(cached_text(&storage, CACHE, &page).await, None);
    assert_eq!(recorder.calls().last(), Some(&HookKind::HandlerDidComplete));
    assert_eq!(recorder.count(HookKind::FetchDidSucceed), 0);
    assert_eq!(recorder.count(HookKind::FetchDidFail), 1);
    assert_eq!(recorder.count(HookKind::CacheWillUpdate), 0);
}

#[tokio::test]
async fn network_first_skips_uncacheable_statuses() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::responding(Response::new(StatusCode::NOT_FOUND, "gone"));
    let page = request("/dashboard");
    let strategy = Strategy::network_first(options());

    let event = event(page.clone(), &storage, &network);
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(cached_text(&storage, CACHE, &page).await, None);
}

#[tokio::test]
async fn network_only_propagates_failures() {
    let storage = MokaCacheStorage::new();
    let strategy = Strategy::network_only(options());

    let event = event(request("/api/items"), &storage, &MockFetch::offline());
    let error = strategy.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();

    assert!(matches!(error, Error::NetworkFailure(FetchError::Network { .. })));
    assert!(error.is_network());
}

#[tokio::test]
async fn network_only_rejects_error_responses() {
    let storage = MokaCacheStorage::new();
    let strategy = Strategy::network_only(options());

    let event = event(
        request("/api/items"),
        &storage,
        &MockFetch::responding(Response::error()),
    );
    let error = strategy.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();

    assert!(matches!(error, Error::NetworkFailure(FetchError::Unusable { .. })));
}

#[tokio::test]
async fn network_only_times_out() {
    let storage = MokaCacheStorage::new();
    let recorder = Recorder::only([HookKind::FetchDidFail]);
    let strategy = Strategy::network_only(
        options()
            .network_timeout(Duration::from_millis(100))
            .plugin(recorder.clone()),
    );

    let event = event(request("/api/items"), &storage, &MockFetch::hanging());
    let error = strategy.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();

    assert!(
        matches!(error, Error::NetworkTimeout { timeout, .. } if timeout == Duration::from_millis(100))
    );
    assert_eq!(recorder.count(HookKind::FetchDidFail), 1);
}

#[tokio::test]
async fn network_only_does_not_cache() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("created");
    let strategy = Strategy::network_only(options());
    let submit = request("/api/items").with_method(Method::POST);

    let event = event(submit, &storage, &network);
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.text(), "created");
    assert_eq!(network.seen()[0].method(), &Method::POST);
    assert_eq!(cached_text(&storage, CACHE, &request("/api/items")).await, None);
}

#[tokio::test]
async fn cache_only_miss_is_an_error() {
    let storage = MokaCacheStorage::new();
    let network = MockFetch::ok("fresh");
    let strategy = Strategy::cache_only(options());

    let event = event(request("/offline.html"), &storage, &network);
    let error = strategy.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();

    assert!(matches!(error, Error::CacheMiss { url } if url.ends_with("/offline.html")));
    assert_eq!(network.calls(), 0);
}

#[tokio::test]
async fn cache_only_loader_miss_returns_not_found_payload() {
    let storage = MokaCacheStorage::new();
    let strategy = Strategy::cache_only(options().loader(true));

    let event = event(request("/?_data=root"), &storage, &MockFetch::offline());
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json_body().unwrap();
    assert_eq!(body, json!({"message": "Not Found"}));
    assert!(synthetic::is_marked(&response));
}

#[tokio::test]
async fn non_http_requests_are_rejected() {
    let storage = MokaCacheStorage::new();
    let recorder = Recorder::new();
    let strategy = Strategy::cache_first(options().plugin(recorder.clone()));

    let data = Request::parse("data:text/plain,hello").unwrap();
    let event = event(data, &storage, &MockFetch::ok("never"));
    let error = strategy.handle(event.clone()).await.unwrap_err();
    event.done().await.unwrap();

    assert!(matches!(error, Error::NotHttpRequest { .. }));
    assert_eq!(recorder.count(HookKind::HandlerWillStart), 0);
}

#[tokio::test]
async fn handler_did_error_recovers_the_response() {
    let storage = MokaCacheStorage::new();
    let recorder = Recorder::only([HookKind::HandlerDidError]);
    let strategy = Strategy::network_only(
        options()
            .plugin(recorder.clone())
            .plugin(LoaderPlugin),
    );

    let event = event(request("/?_data=routes/index"), &storage, &MockFetch::offline());
    let response = strategy.handle(event.clone()).await.unwrap();
    event.done().await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[&CATCH_HEADER], "yes");
    assert_eq!(recorder.count(HookKind::HandlerDidError), 1);
}

#[tokio::test]
async fn completion_runs_after_the_response() {
    common::init_tracing();
    let storage = MokaCacheStorage::new();
    let recorder = Recorder::new();
    let page = request("/dashboard");
    let strategy = Strategy::network_first(options().plugin(recorder.clone()));

    let event = event(page.clone(), &storage, &MockFetch::ok("fresh"));
    let (response, completion) = strategy.handle_all(event.clone());
    assert_eq!(response.await.unwrap().text(), "fresh");
    completion.await.unwrap();

    let calls = recorder.calls();
    let position = |hook: HookKind| calls.iter().position(|called| *called == hook).unwrap();
    assert_eq!(calls.first(), Some(&HookKind::HandlerWillStart));
    assert_eq!(calls.last(), Some(&HookKind::HandlerDidComplete));
    assert!(position(HookKind::RequestWillFetch) < position(HookKind::FetchDidSucceed));
    assert!(position(HookKind::FetchDidSucceed) < position(HookKind::HandlerWillRespond));
    assert!(position(HookKind::HandlerWillRespond) < position(HookKind::HandlerDidRespond));
    assert!(position(HookKind::CacheDidUpdate) < position(HookKind::HandlerDidComplete));
    assert_eq!(recorder.count(HookKind::HandlerDidComplete), 1);
    assert_eq!(cached_text(&storage, CACHE, &page).await.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn completion_runs_after_failures() {
    let storage = MokaCacheStorage::new();
    let recorder = Recorder::only([HookKind::HandlerDidRespond, HookKind::HandlerDidComplete]);
    let strategy = Strategy::cache_only(options().plugin(recorder.clone()));

    let event = event(request("/missing"), &storage, &MockFetch::offline());
    let (response, completion) = strategy.handle_all(event);
    assert!(response.await.is_err());
    completion.await.unwrap();

    assert_eq!(
        recorder.calls(),
        vec![HookKind::HandlerDidRespond, HookKind::HandlerDidComplete]
    );
}

#[test]
fn zero_timeout_falls_back_to_default() {
    let strategy = Strategy::network_first(options().network_timeout(Duration::ZERO));
    assert_eq!(strategy.network_timeout(), Duration::from_secs(10));
    assert_eq!(strategy.cache_name(), CACHE);
    assert_eq!(strategy.kind().as_str(), "network_first");
}
