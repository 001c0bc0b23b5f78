//! Plugin pipeline.
//!
//! A [`Plugin`] is a named set of optional lifecycle hooks. Strategies build a
//! [`PluginRegistry`] once at construction, and every request handled by the
//! strategy runs the registered hooks at fixed points, in registration order.
//!
//! Plugins declare the hooks they implement through [`Plugin::hooks`]. Hooks
//! that are not declared are never called, even if the method is overridden.
//!
//! ```
//! use async_trait::async_trait;
//! use fetchbox::plugin::{HookContext, HookKind, HookResult, HookSet, Plugin};
//! use fetchbox_core::{Request, Response};
//!
//! /// Only caches responses that declare a content type.
//! struct RequireContentType;
//!
//! #[async_trait]
//! impl Plugin for RequireContentType {
//!     fn name(&self) -> &str {
//!         "require-content-type"
//!     }
//!
//!     fn hooks(&self) -> HookSet {
//!         HookSet::from([HookKind::CacheWillUpdate])
//!     }
//!
//!     async fn cache_will_update(
//!         &self,
//!         _ctx: HookContext<'_>,
//!         _request: &Request,
//!         response: Response,
//!     ) -> HookResult<Option<Response>> {
//!         Ok(response
//!             .headers()
//!             .contains_key(http::header::CONTENT_TYPE)
//!             .then_some(response))
//!     }
//! }
//! ```

mod cacheable;
mod hooks;
mod loader;
mod registry;
mod state;

use async_trait::async_trait;
use fetchbox_core::{BoxError, Request, RequestInfo, Response};

pub use cacheable::CacheableResponsePlugin;
pub use hooks::{HookKind, HookSet};
pub use loader::LoaderPlugin;
pub use registry::PluginRegistry;
pub use state::PluginState;

use crate::error::Error;
use crate::event::FetchEvent;
use crate::routing::Params;

/// Result type returned by plugin hooks.
pub type HookResult<T> = Result<T, BoxError>;

/// Whether a cache key is computed for reading or for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKeyMode {
    /// Cache lookup.
    Read,
    /// Cache write.
    Write,
}

impl CacheKeyMode {
    /// Mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKeyMode::Read => "read",
            CacheKeyMode::Write => "write",
        }
    }
}

/// Context shared by every hook invocation.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Request the strategy is handling.
    pub request: &'a Request,
    /// Event the request came from.
    pub event: &'a FetchEvent,
    /// Route params, if the route captured any.
    pub params: Option<&'a Params>,
    /// State of this plugin for this request.
    pub state: &'a PluginState,
}

/// Lifecycle hooks around strategy execution.
///
/// All hooks have pass-through defaults. Implement the ones listed in
/// [`Plugin::hooks`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Hooks this plugin implements.
    fn hooks(&self) -> HookSet;

    /// Called before the strategy starts.
    async fn handler_will_start(&self, _ctx: HookContext<'_>) -> HookResult<()> {
        Ok(())
    }

    /// Called before a network request; returns the request to send.
    async fn request_will_fetch(
        &self,
        _ctx: HookContext<'_>,
        request: Request,
    ) -> HookResult<Request> {
        Ok(request)
    }

    /// Called after a network request failed.
    async fn fetch_did_fail(
        &self,
        _ctx: HookContext<'_>,
        _original_request: &Request,
        _request: &Request,
        _error: &Error,
    ) -> HookResult<()> {
        Ok(())
    }

    /// Called after a network request succeeded; returns the response to use.
    async fn fetch_did_succeed(
        &self,
        _ctx: HookContext<'_>,
        _request: &Request,
        response: Response,
    ) -> HookResult<Response> {
        Ok(response)
    }

    /// Called before a cache key is used; returns the key to use.
    async fn cache_key_will_be_used(
        &self,
        _ctx: HookContext<'_>,
        key: RequestInfo,
        _mode: CacheKeyMode,
    ) -> HookResult<RequestInfo> {
        Ok(key)
    }

    /// Called before a cache write. Returning `None` vetoes the write.
    async fn cache_will_update(
        &self,
        _ctx: HookContext<'_>,
        _request: &Request,
        response: Response,
    ) -> HookResult<Option<Response>> {
        Ok(Some(response))
    }

    /// Called with the result of a cache lookup; returns the response to use.
    async fn cached_response_will_be_used(
        &self,
        _ctx: HookContext<'_>,
        _cache_name: &str,
        _request: &Request,
        cached: Option<Response>,
    ) -> HookResult<Option<Response>> {
        Ok(cached)
    }

    /// Called after a cache write with the replaced and the new entry.
    async fn cache_did_update(
        &self,
        _ctx: HookContext<'_>,
        _cache_name: &str,
        _request: &Request,
        _old_response: Option<&Response>,
        _new_response: &Response,
    ) -> HookResult<()> {
        Ok(())
    }

    /// Called before the response is handed out; returns the response to use.
    async fn handler_will_respond(
        &self,
        _ctx: HookContext<'_>,
        response: Response,
    ) -> HookResult<Response> {
        Ok(response)
    }

    /// Called once the response was handed out.
    async fn handler_did_respond(
        &self,
        _ctx: HookContext<'_>,
        _response: Option<&Response>,
    ) -> HookResult<()> {
        Ok(())
    }

    /// Called after all background work of the handler finished.
    async fn handler_did_complete(
        &self,
        _ctx: HookContext<'_>,
        _response: Option<&Response>,
        _error: Option<&Error>,
    ) -> HookResult<()> {
        Ok(())
    }

    /// Called after the strategy failed. The first response returned recovers.
    async fn handler_did_error(
        &self,
        _ctx: HookContext<'_>,
        _error: &Error,
    ) -> HookResult<Option<Response>> {
        Ok(None)
    }
}
