//! Request routing.
//!
//! A [`Router`] keeps an ordered table of [`Route`]s per HTTP method. For
//! each request the first route whose match callback succeeds wins; if none
//! does, the default handler of the method is used. Handler failures are
//! recovered through the route's catch handler and then the router's global
//! catch handler.

mod capture;
pub mod matchers;
mod route;
mod router;

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use fetchbox_core::{Request, Response};
use serde_json::Value;
use url::Url;

pub use capture::Capture;
pub use route::Route;
pub use router::Router;

use crate::error::Error;
use crate::event::FetchEvent;

/// Values captured by a match callback.
pub type Params = Value;

/// Outcome of a match callback.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MatchResult {
    /// The route does not apply.
    #[default]
    NoMatch,
    /// The route applies, optionally with captured params.
    Match(Option<Params>),
}

impl MatchResult {
    /// Match without params.
    pub fn matched() -> Self {
        MatchResult::Match(None)
    }

    /// Whether the route applies.
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Match(_))
    }

    /// Interprets an arbitrary value by truthiness.
    ///
    /// `null`, `false`, `0`, `NaN` and `""` do not match. Any other value
    /// matches and becomes the params.
    pub fn from_value(value: Value) -> Self {
        let truthy = match &value {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
            Value::String(text) => !text.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        };
        if truthy {
            MatchResult::Match(Some(value))
        } else {
            MatchResult::NoMatch
        }
    }

    /// Params as seen by handlers.
    ///
    /// `true`, empty arrays and empty objects carry no params.
    pub fn into_params(self) -> Option<Params> {
        match self {
            MatchResult::NoMatch => None,
            MatchResult::Match(params) => params.and_then(normalize_params),
        }
    }
}

fn normalize_params(params: Params) -> Option<Params> {
    match &params {
        Value::Array(items) if items.is_empty() => None,
        Value::Object(fields) if fields.is_empty() => None,
        Value::Bool(_) => None,
        _ => Some(params),
    }
}

impl From<bool> for MatchResult {
    fn from(matched: bool) -> Self {
        if matched {
            MatchResult::matched()
        } else {
            MatchResult::NoMatch
        }
    }
}

impl From<Value> for MatchResult {
    fn from(value: Value) -> Self {
        MatchResult::from_value(value)
    }
}

impl<T: Into<MatchResult>> From<Option<T>> for MatchResult {
    fn from(value: Option<T>) -> Self {
        value.map_or(MatchResult::NoMatch, Into::into)
    }
}

/// What a match callback sees.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// Absolute request URL.
    pub url: &'a Url,
    /// Whether the URL has the router's origin.
    pub same_origin: bool,
    /// The request.
    pub request: &'a Request,
    /// The event the request came from.
    pub event: &'a FetchEvent,
}

/// Decides whether a route applies to a request.
pub trait MatchCallback: Send + Sync {
    /// Matches the request.
    fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult;
}

impl<F> MatchCallback for F
where
    F: Fn(&MatchContext<'_>) -> MatchResult + Send + Sync,
{
    fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult {
        self(ctx)
    }
}

/// What a handler receives.
#[derive(Debug, Clone)]
pub struct RouteContext {
    /// Absolute request URL.
    pub url: Url,
    /// The request.
    pub request: Request,
    /// The event the request came from.
    pub event: FetchEvent,
    /// Params captured by the route.
    pub params: Option<Params>,
}

impl RouteContext {
    /// Context for `event`'s own request.
    pub fn from_event(event: FetchEvent) -> Self {
        let request = event.request().clone();
        Self {
            url: request.url().clone(),
            request,
            event,
            params: None,
        }
    }
}

/// Produces the response for a routed request.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles the request.
    async fn handle(&self, ctx: RouteContext) -> Result<Response, Error>;
}

#[async_trait]
impl<T> Handler for std::sync::Arc<T>
where
    T: Handler + ?Sized,
{
    async fn handle(&self, ctx: RouteContext) -> Result<Response, Error> {
        (**self).handle(ctx).await
    }
}

/// [`Handler`] backed by an async closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Adapts an async closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(RouteContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, Error>> + Send,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(RouteContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, Error>> + Send,
{
    async fn handle(&self, ctx: RouteContext) -> Result<Response, Error> {
        (self.f)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!(0.0)] {
            assert_eq!(MatchResult::from_value(falsy), MatchResult::NoMatch);
        }
        for truthy in [json!(true), json!(1), json!("x"), json!([]), json!({})] {
            assert!(MatchResult::from_value(truthy).is_match());
        }
    }

    #[test]
    fn empty_captures_normalize_to_no_params() {
        for empty in [json!(true), json!([]), json!({})] {
            assert_eq!(MatchResult::from_value(empty).into_params(), None);
        }
        assert_eq!(
            MatchResult::from_value(json!(["a"])).into_params(),
            Some(json!(["a"]))
        );
        assert_eq!(
            MatchResult::from_value(json!({"id": "1"})).into_params(),
            Some(json!({"id": "1"}))
        );
    }
}
