use async_trait::async_trait;
use fetchbox_core::{Request, Response};
use tracing::debug;

use super::{HookContext, HookKind, HookResult, HookSet, Plugin};
use crate::error::Error;
use crate::synthetic;

/// Plugin for data requests issued by a client-side router.
///
/// Cached responses are tagged with the worker marker header, and any strategy
/// failure is answered with the synthetic `500` network error payload so the
/// client always receives JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderPlugin;

#[async_trait]
impl Plugin for LoaderPlugin {
    fn name(&self) -> &str {
        "loader"
    }

    fn hooks(&self) -> HookSet {
        HookSet::from([
            HookKind::CachedResponseWillBeUsed,
            HookKind::HandlerDidError,
        ])
    }

    async fn cached_response_will_be_used(
        &self,
        _ctx: HookContext<'_>,
        _cache_name: &str,
        _request: &Request,
        cached: Option<Response>,
    ) -> HookResult<Option<Response>> {
        Ok(cached.map(synthetic::mark_fallback))
    }

    async fn handler_did_error(
        &self,
        ctx: HookContext<'_>,
        error: &Error,
    ) -> HookResult<Option<Response>> {
        debug!(url = %ctx.request.url(), %error, "answering failed loader request");
        Ok(Some(synthetic::network_error()))
    }
}
