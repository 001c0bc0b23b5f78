//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fetchbox::plugin::{CacheKeyMode, HookContext, HookResult};
use fetchbox::{Error, FetchEvent, HookKind, HookSet, Plugin, Scope};
use fetchbox_core::{
    CacheStorage, Fetch, FetchError, Request, RequestInfo, Response,
};
use fetchbox_moka::MokaCacheStorage;
use tracing_subscriber::EnvFilter;
use url::Url;

pub const ORIGIN: &str = "https://app.example.com/";

/// Routes log output of the test to the test harness. Filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

/// GET request for `path` on the test origin, or for an absolute URL.
pub fn request(path: &str) -> Request {
    Request::get(origin().join(path).unwrap())
}

#[derive(Clone)]
enum Behavior {
    Respond(Response),
    Fail,
    Hang,
    Delay(Duration, Response),
}

/// Network mock counting the requests it receives.
#[derive(Clone)]
pub struct MockFetch {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Request>>>,
    behavior: Behavior,
}

impl MockFetch {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            behavior,
        }
    }

    /// Answers every request with `response`.
    pub fn responding(response: Response) -> Self {
        Self::with_behavior(Behavior::Respond(response))
    }

    /// Answers every request with `200` and `body`.
    pub fn ok(body: &'static str) -> Self {
        Self::responding(Response::ok(body))
    }

    /// Fails every request as if offline.
    pub fn offline() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    /// Never settles.
    pub fn hanging() -> Self {
        Self::with_behavior(Behavior::Hang)
    }

    /// Answers every request with `200` and `body` after `delay`.
    pub fn delayed(body: &'static str, delay: Duration) -> Self {
        Self::with_behavior(Behavior::Delay(delay, Response::ok(body)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests that reached the network, in order.
    pub fn seen(&self) -> Vec<Request> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        match &self.behavior {
            Behavior::Respond(response) => Ok(response.clone()),
            Behavior::Fail => Err(FetchError::network(&request, "connection refused")),
            Behavior::Hang => std::future::pending().await,
            Behavior::Delay(delay, response) => {
                tokio::time::sleep(*delay).await;
                Ok(response.clone())
            }
        }
    }
}

/// Event for `request` backed by `storage` and `network`.
pub fn event(request: Request, storage: &MokaCacheStorage, network: &MockFetch) -> FetchEvent {
    FetchEvent::new(request, Scope::new(storage.clone(), network.clone()))
}

/// Stores `response` for `request` in the cache named `cache_name`.
pub async fn seed(storage: &MokaCacheStorage, cache_name: &str, request: &Request, response: Response) {
    storage
        .open(cache_name)
        .await
        .unwrap()
        .put(request, response)
        .await
        .unwrap();
}

/// Body of the entry stored for `request` in `cache_name`, if any.
pub async fn cached_text(storage: &MokaCacheStorage, cache_name: &str, request: &Request) -> Option<String> {
    storage
        .open(cache_name)
        .await
        .unwrap()
        .match_request(request, Default::default())
        .await
        .unwrap()
        .map(|response| response.text())
}

/// Plugin recording every hook invocation.
#[derive(Clone)]
pub struct Recorder {
    hooks: HookSet,
    log: Arc<Mutex<Vec<HookKind>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::only(HookSet::all())
    }

    /// Records only `hooks`.
    pub fn only(hooks: impl Into<HookSet>) -> Self {
        Self {
            hooks: hooks.into(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, hook: HookKind) {
        self.log.lock().unwrap().push(hook);
    }

    /// Hooks called so far, in order.
    pub fn calls(&self) -> Vec<HookKind> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, hook: HookKind) -> usize {
        self.calls().into_iter().filter(|called| *called == hook).count()
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn hooks(&self) -> HookSet {
        self.hooks
    }

    async fn handler_will_start(&self, _ctx: HookContext<'_>) -> HookResult<()> {
        self.record(HookKind::HandlerWillStart);
        Ok(())
    }

    async fn request_will_fetch(&self, _ctx: HookContext<'_>, request: Request) -> HookResult<Request> {
        self.record(HookKind::RequestWillFetch);
        Ok(request)
    }

    async fn fetch_did_fail(
        &self,
        _ctx: HookContext<'_>,
        _original_request: &Request,
        _request: &Request,
        _error: &Error,
    ) -> HookResult<()> {
        self.record(HookKind::FetchDidFail);
        Ok(())
    }

    async fn fetch_did_succeed(
        &self,
        _ctx: HookContext<'_>,
        _request: &Request,
        response: Response,
    ) -> HookResult<Response> {
        self.record(HookKind::FetchDidSucceed);
        Ok(response)
    }

    async fn cache_key_will_be_used(
        &self,
        _ctx: HookContext<'_>,
        key: RequestInfo,
        _mode: CacheKeyMode,
    ) -> HookResult<RequestInfo> {
        self.record(HookKind::CacheKeyWillBeUsed);
        Ok(key)
    }

    async fn cache_will_update(
        &self,
        _ctx: HookContext<'_>,
        _request: &Request,
        response: Response,
    ) -> HookResult<Option<Response>> {
        self.record(HookKind::CacheWillUpdate);
        Ok(Some(response))
    }

    async fn cached_response_will_be_used(
        &self,
        _ctx: HookContext<'_>,
        _cache_name: &str,
        _request: &Request,
        cached: Option<Response>,
    ) -> HookResult<Option<Response>> {
        self.record(HookKind::CachedResponseWillBeUsed);
        Ok(cached)
    }

    async fn cache_did_update(
        &self,
        _ctx: HookContext<'_>,
        _cache_name: &str,
        _request: &Request,
        _old_response: Option<&Response>,
        _new_response: &Response,
    ) -> HookResult<()> {
        self.record(HookKind::CacheDidUpdate);
        Ok(())
    }

    async fn handler_will_respond(&self, _ctx: HookContext<'_>, response: Response) -> HookResult<Response> {
        self.record(HookKind::HandlerWillRespond);
        Ok(response)
    }

    async fn handler_did_respond(&self, _ctx: HookContext<'_>, _response: Option<&Response>) -> HookResult<()> {
        self.record(HookKind::HandlerDidRespond);
        Ok(())
    }

    async fn handler_did_complete(
        &self,
        _ctx: HookContext<'_>,
        _response: Option<&Response>,
        _error: Option<&Error>,
    ) -> HookResult<()> {
        self.record(HookKind::HandlerDidComplete);
        Ok(())
    }

    async fn handler_did_error(&self, _ctx: HookContext<'_>, _error: &Error) -> HookResult<Option<Response>> {
        self.record(HookKind::HandlerDidError);
        Ok(None)
    }
}
