//! Ready-made match callbacks for common request kinds.
//!
//! Built for applications with a client-side router: hashed build assets,
//! document navigations and data (`_data`) requests each get their own route.

use http::Method;
use serde_json::Value;

use super::{MatchCallback, MatchContext, MatchResult};
use fetchbox_core::Request;

/// Default asset URL fragments.
pub const DEFAULT_ASSET_PREFIXES: [&str; 2] = ["/build/", "/icons"];

/// Search parameter carrying the route id of a data request.
pub const LOADER_PARAM: &str = "_data";

/// Kind of a request, as far as routing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Static asset.
    Asset,
    /// Document navigation.
    Document,
    /// Data request.
    Loader,
}

/// Whether `request` is a `GET` whose URL contains one of `prefixes`.
pub fn is_asset_request<S: AsRef<str>>(request: &Request, prefixes: &[S]) -> bool {
    request.method() == Method::GET
        && prefixes
            .iter()
            .any(|prefix| request.url().as_str().contains(prefix.as_ref()))
}

/// Whether `request` is a `GET` navigation.
pub fn is_document_request(request: &Request) -> bool {
    request.method() == Method::GET && request.is_navigation()
}

/// Route id of a `GET` data request, if it is one.
pub fn loader_route_id(request: &Request) -> Option<String> {
    if request.method() != Method::GET {
        return None;
    }
    request
        .url()
        .query_pairs()
        .find(|(name, _)| name == LOADER_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Classifies `request` using the default asset prefixes.
///
/// Asset wins over document, document wins over loader.
pub fn classify(request: &Request) -> Option<RequestKind> {
    if is_asset_request(request, DEFAULT_ASSET_PREFIXES.as_slice()) {
        Some(RequestKind::Asset)
    } else if is_document_request(request) {
        Some(RequestKind::Document)
    } else if loader_route_id(request).is_some() {
        Some(RequestKind::Loader)
    } else {
        None
    }
}

/// Matches asset requests. See [`is_asset_request`].
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    prefixes: Vec<String>,
}

impl AssetMatcher {
    /// Matches URLs containing any of `prefixes`.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for AssetMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_PREFIXES)
    }
}

impl MatchCallback for AssetMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult {
        is_asset_request(ctx.request, self.prefixes.as_slice()).into()
    }
}

/// Matches `GET` navigations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentMatcher;

impl MatchCallback for DocumentMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult {
        is_document_request(ctx.request).into()
    }
}

/// Matches data requests. The route id becomes the params.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderMatcher;

impl MatchCallback for LoaderMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult {
        loader_route_id(ctx.request).map(Value::String).into()
    }
}

/// Matches requests to the router's origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameOriginMatcher;

impl MatchCallback for SameOriginMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult {
        ctx.same_origin.into()
    }
}

/// [`AssetMatcher`] with the default prefixes.
pub fn asset() -> AssetMatcher {
    AssetMatcher::default()
}

/// [`DocumentMatcher`].
pub fn document() -> DocumentMatcher {
    DocumentMatcher
}

/// [`LoaderMatcher`].
pub fn loader() -> LoaderMatcher {
    LoaderMatcher
}

/// [`SameOriginMatcher`].
pub fn same_origin() -> SameOriginMatcher {
    SameOriginMatcher
}
