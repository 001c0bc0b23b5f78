use async_trait::async_trait;
use fetchbox_core::{Request, Response};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use tracing::debug;

use super::{HookContext, HookKind, HookResult, HookSet, Plugin};

/// Restricts cache writes to responses with listed statuses or header values.
///
/// When both statuses and headers are configured a response must satisfy both.
/// A header rule passes when any listed header has the listed value.
///
/// ```
/// use fetchbox::plugin::CacheableResponsePlugin;
/// use http::StatusCode;
///
/// let plugin = CacheableResponsePlugin::new()
///     .status(StatusCode::OK)
///     .status(StatusCode::NOT_MODIFIED);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheableResponsePlugin {
    statuses: Vec<StatusCode>,
    headers: HeaderMap,
}

impl CacheableResponsePlugin {
    /// Creates a plugin without rules. Add at least one status or header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows responses with `status`.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.statuses.push(status);
        self
    }

    /// Allows responses with any of `statuses`.
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    /// Allows responses whose `name` header equals `value`.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Whether `response` passes the configured rules.
    pub fn is_cacheable(&self, response: &Response) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&response.status());
        let headers_ok = self.headers.is_empty()
            || self
                .headers
                .iter()
                .any(|(name, value)| response.headers().get(name) == Some(value));
        status_ok && headers_ok
    }
}

#[async_trait]
impl Plugin for CacheableResponsePlugin {
    fn name(&self) -> &str {
        "cacheable-response"
    }

    fn hooks(&self) -> HookSet {
        HookSet::empty().with(HookKind::CacheWillUpdate)
    }

    async fn cache_will_update(
        &self,
        _ctx: HookContext<'_>,
        request: &Request,
        response: Response,
    ) -> HookResult<Option<Response>> {
        if self.is_cacheable(&response) {
            Ok(Some(response))
        } else {
            debug!(url = %request.url(), status = %response.status(), "response is not cacheable");
            Ok(None)
        }
    }
}
