use std::fmt;
use std::sync::Arc;

use fetchbox_core::{Request, Response};
use futures::future::BoxFuture;
use http::Method;
use indexmap::IndexMap;
use tracing::debug;
use url::Url;

use super::{Capture, Handler, MatchContext, Params, Route, RouteContext};
use crate::error::{Error, RouteError};
use crate::event::FetchEvent;

/// Ordered route table with per-method defaults and a global catch handler.
///
/// ```
/// use fetchbox::routing::{Router, handler_fn};
/// use fetchbox_core::Response;
/// use http::Method;
/// use url::Url;
///
/// let mut router = Router::new(Url::parse("https://app.example.com/").unwrap());
/// router
///     .register(
///         "/health",
///         handler_fn(|_ctx| async { Ok(Response::ok("ok")) }),
///         Method::GET,
///     )
///     .unwrap();
/// assert_eq!(router.routes()[&Method::GET].len(), 1);
/// ```
pub struct Router {
    origin: Url,
    routes: IndexMap<Method, Vec<Arc<Route>>>,
    default_handlers: IndexMap<Method, Arc<dyn Handler>>,
    catch_handler: Option<Arc<dyn Handler>>,
}

impl Router {
    /// Creates an empty router for the application at `origin`.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            routes: IndexMap::new(),
            default_handlers: IndexMap::new(),
            catch_handler: None,
        }
    }

    /// Application origin. Path captures resolve against it.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Registered routes per method, in priority order.
    pub fn routes(&self) -> &IndexMap<Method, Vec<Arc<Route>>> {
        &self.routes
    }

    /// Appends `route` to its method's table.
    pub fn register_route(&mut self, route: impl Into<Arc<Route>>) {
        let route = route.into();
        debug!(method = %route.method(), "registering route");
        self.routes
            .entry(route.method().clone())
            .or_default()
            .push(route);
    }

    /// Builds a route from `capture` and registers it.
    pub fn register<H>(
        &mut self,
        capture: impl Into<Capture>,
        handler: H,
        method: Method,
    ) -> Result<Arc<Route>, RouteError>
    where
        H: Handler + 'static,
    {
        let matcher = capture.into().into_matcher(&self.origin)?;
        let route = Arc::new(Route::from_parts(matcher, Arc::new(handler), method));
        self.register_route(route.clone());
        Ok(route)
    }

    /// Removes `route` from its method's table.
    pub fn unregister_route(&mut self, route: &Arc<Route>) -> Result<(), RouteError> {
        let method = route.method().clone();
        let Some(routes) = self.routes.get_mut(&method) else {
            return Err(RouteError::RouteNotFound { method });
        };
        let Some(position) = routes.iter().position(|known| Arc::ptr_eq(known, route)) else {
            return Err(RouteError::RouteNotRegistered { method });
        };
        routes.remove(position);
        if routes.is_empty() {
            self.routes.shift_remove(&method);
        }
        Ok(())
    }

    /// Handler used for `method` when no route matches.
    pub fn set_default_handler<H>(&mut self, handler: H, method: Method)
    where
        H: Handler + 'static,
    {
        self.default_handlers.insert(method, Arc::new(handler));
    }

    /// Handler recovering from any failure not recovered by the route itself.
    pub fn set_catch_handler<H>(&mut self, handler: H)
    where
        H: Handler + 'static,
    {
        self.catch_handler = Some(Arc::new(handler));
    }

    /// First route of the request method that matches, with its normalized params.
    pub fn find_matching_route(
        &self,
        ctx: &MatchContext<'_>,
    ) -> Option<(Arc<Route>, Option<Params>)> {
        let routes = self.routes.get(ctx.request.method())?;
        routes.iter().find_map(|route| {
            let result = route.matches(ctx);
            result
                .is_match()
                .then(|| (route.clone(), result.into_params()))
        })
    }

    /// Routes `request` and returns the future producing its response.
    ///
    /// Returns `None` when the request is not http(s) or when neither a route
    /// nor a default handler applies; the caller passes such requests through.
    pub fn handle_request(
        &self,
        request: &Request,
        event: &FetchEvent,
    ) -> Option<BoxFuture<'static, Result<Response, Error>>> {
        let url = request.url();
        if !request.is_http() {
            debug!(%url, "router only handles http(s) requests");
            return None;
        }

        let same_origin = url.origin() == self.origin.origin();
        let ctx = MatchContext {
            url,
            same_origin,
            request,
            event,
        };

        let (route, params) = match self.find_matching_route(&ctx) {
            Some((route, params)) => (Some(route), params),
            None => (None, None),
        };
        let handler = match &route {
            Some(route) => {
                debug!(%url, method = %request.method(), ?params, "found matching route");
                route.handler().clone()
            }
            None => match self.default_handlers.get(request.method()) {
                Some(handler) => {
                    debug!(%url, method = %request.method(), "using default handler");
                    handler.clone()
                }
                None => {
                    debug!(%url, method = %request.method(), "no route matched");
                    return None;
                }
            },
        };

        let route_catch = route.as_ref().and_then(|route| route.catch_handler().cloned());
        let global_catch = self.catch_handler.clone();
        let route_ctx = RouteContext {
            url: url.clone(),
            request: request.clone(),
            event: event.clone(),
            params,
        };

        Some(Box::pin(async move {
            let mut error = match handler.handle(route_ctx.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if let Some(catch) = route_catch {
                debug!(%error, "recovering with route catch handler");
                match catch.handle(route_ctx.clone()).await {
                    Ok(response) => return Ok(response),
                    Err(catch_error) => error = catch_error,
                }
            }

            match global_catch {
                Some(catch) => {
                    debug!(%error, "recovering with global catch handler");
                    catch
                        .handle(RouteContext {
                            params: None,
                            ..route_ctx
                        })
                        .await
                }
                None => Err(error),
            }
        }))
    }

    /// Routes the event's own request.
    pub fn handle(&self, event: &FetchEvent) -> Option<BoxFuture<'static, Result<Response, Error>>> {
        self.handle_request(event.request(), event)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("origin", &self.origin.as_str())
            .field("routes", &self.routes)
            .field("default_handlers", &self.default_handlers.keys())
            .field("catch_handler", &self.catch_handler.is_some())
            .finish()
    }
}
