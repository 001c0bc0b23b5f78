use std::fmt;
use std::sync::{Arc, OnceLock};

use http::Method;

use super::{Handler, MatchCallback, MatchContext, MatchResult};

/// A match callback, its handler and the method it applies to.
///
/// Routes are immutable once built, except for the catch handler, which can
/// be set once.
pub struct Route {
    matcher: Box<dyn MatchCallback>,
    handler: Arc<dyn Handler>,
    method: Method,
    catch_handler: OnceLock<Arc<dyn Handler>>,
}

impl Route {
    /// Creates a route.
    pub fn new<M, H>(matcher: M, handler: H, method: Method) -> Self
    where
        M: MatchCallback + 'static,
        H: Handler + 'static,
    {
        Self::from_parts(Box::new(matcher), Arc::new(handler), method)
    }

    /// Creates a route from boxed parts.
    pub fn from_parts(
        matcher: Box<dyn MatchCallback>,
        handler: Arc<dyn Handler>,
        method: Method,
    ) -> Self {
        Self {
            matcher,
            handler,
            method,
            catch_handler: OnceLock::new(),
        }
    }

    /// Method the route applies to.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Route handler.
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Runs the match callback.
    pub fn matches(&self, ctx: &MatchContext<'_>) -> MatchResult {
        self.matcher.matches(ctx)
    }

    /// Sets the handler recovering from failures of this route.
    ///
    /// Returns `false` if a catch handler was already set.
    pub fn set_catch_handler<H>(&self, handler: H) -> bool
    where
        H: Handler + 'static,
    {
        self.catch_handler.set(Arc::new(handler)).is_ok()
    }

    /// Catch handler, if set.
    pub fn catch_handler(&self) -> Option<&Arc<dyn Handler>> {
        self.catch_handler.get()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("catch_handler", &self.catch_handler.get().is_some())
            .finish_non_exhaustive()
    }
}
