//! Declarative router configuration.
//!
//! ```yaml
//! routes:
//!   - capture:
//!       Asset: {}
//!     strategy:
//!       type: CacheFirst
//!       cache_name: assets
//!   - capture:
//!       Regex: "^https://api\\.example\\.com/"
//!     method: GET
//!     strategy:
//!       type: NetworkFirst
//!       network_timeout: 3s
//!       cacheable:
//!         statuses: [200]
//! default:
//!   type: NetworkOnly
//! ```

use std::sync::Arc;
use std::time::Duration;

use fetchbox_core::MatchOptions;
use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::error::RouteError;
use crate::plugin::{CacheableResponsePlugin, LoaderPlugin, Plugin};
use crate::routing::{Capture, Router, matchers};
use crate::strategy::{Strategy, StrategyKind, StrategyOptions};

/// Errors raised while turning configuration into a router.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A regex capture does not compile.
    #[error("invalid regex capture {pattern:?}")]
    InvalidRegex {
        /// The pattern.
        pattern: String,
        /// Compile error.
        #[source]
        source: regex::Error,
    },
    /// A path capture is rejected by the router.
    #[error(transparent)]
    InvalidCapture(#[from] RouteError),
    /// A cacheable status is not a valid HTTP status code.
    #[error("invalid cacheable status {0}")]
    InvalidStatus(u16),
    /// A cacheable header name or value is invalid.
    #[error("invalid cacheable header {name}: {value}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// Header value.
        value: String,
    },
}

/// HTTP methods a route can be registered for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[allow(clippy::upper_case_acronyms)]
pub enum HttpMethod {
    /// `DELETE`
    DELETE,
    /// `GET`
    #[default]
    GET,
    /// `HEAD`
    HEAD,
    /// `PATCH`
    PATCH,
    /// `POST`
    POST,
    /// `PUT`
    PUT,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::DELETE => Method::DELETE,
            HttpMethod::GET => Method::GET,
            HttpMethod::HEAD => Method::HEAD,
            HttpMethod::PATCH => Method::PATCH,
            HttpMethod::POST => Method::POST,
            HttpMethod::PUT => Method::PUT,
        }
    }
}

/// Asset matcher settings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct AssetConfig {
    /// URL fragments identifying assets. Empty means the defaults.
    #[serde(default)]
    pub prefixes: Vec<String>,
}

/// What a configured route matches.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum CaptureConfig {
    /// Exact path or absolute URL.
    Path(String),
    /// Regular expression over the full URL.
    Regex(String),
    /// Static assets.
    Asset(AssetConfig),
    /// Document navigations.
    Document,
    /// Data requests.
    Loader,
    /// Requests to the router's origin.
    SameOrigin,
}

impl CaptureConfig {
    fn into_capture(self) -> Result<Capture, ConfigError> {
        Ok(match self {
            CaptureConfig::Path(path) => Capture::Path(path),
            CaptureConfig::Regex(pattern) => {
                let regex = Regex::new(&pattern)
                    .map_err(|source| ConfigError::InvalidRegex { pattern, source })?;
                Capture::Regex(regex)
            }
            CaptureConfig::Asset(AssetConfig { prefixes }) if prefixes.is_empty() => {
                Capture::callback(matchers::asset())
            }
            CaptureConfig::Asset(AssetConfig { prefixes }) => {
                Capture::callback(matchers::AssetMatcher::new(prefixes))
            }
            CaptureConfig::Document => Capture::callback(matchers::document()),
            CaptureConfig::Loader => Capture::callback(matchers::loader()),
            CaptureConfig::SameOrigin => Capture::callback(matchers::same_origin()),
        })
    }
}

/// Built-in strategy kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum StrategyType {
    /// [`StrategyKind::CacheFirst`].
    CacheFirst,
    /// [`StrategyKind::NetworkFirst`].
    NetworkFirst,
    /// [`StrategyKind::NetworkOnly`].
    NetworkOnly,
    /// [`StrategyKind::CacheOnly`].
    CacheOnly,
}

impl From<StrategyType> for StrategyKind {
    fn from(kind: StrategyType) -> Self {
        match kind {
            StrategyType::CacheFirst => StrategyKind::CacheFirst,
            StrategyType::NetworkFirst => StrategyKind::NetworkFirst,
            StrategyType::NetworkOnly => StrategyKind::NetworkOnly,
            StrategyType::CacheOnly => StrategyKind::CacheOnly,
        }
    }
}

/// Rules of a [`CacheableResponsePlugin`].
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct CacheableConfig {
    /// Cacheable statuses.
    #[serde(default)]
    pub statuses: Vec<u16>,
    /// Header values marking a response cacheable.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl CacheableConfig {
    fn into_plugin(self) -> Result<CacheableResponsePlugin, ConfigError> {
        let mut plugin = CacheableResponsePlugin::new();
        for status in self.statuses {
            let status =
                StatusCode::from_u16(status).map_err(|_| ConfigError::InvalidStatus(status))?;
            plugin = plugin.status(status);
        }
        for (name, value) in self.headers {
            let header_name = HeaderName::try_from(name.as_str());
            let header_value = HeaderValue::try_from(value.as_str());
            match (header_name, header_value) {
                (Ok(header_name), Ok(header_value)) => {
                    plugin = plugin.header(header_name, header_value);
                }
                _ => return Err(ConfigError::InvalidHeader { name, value }),
            }
        }
        Ok(plugin)
    }
}

/// A configured strategy.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct StrategyConfig {
    /// Strategy kind.
    #[serde(rename = "type")]
    pub kind: StrategyType,
    /// Cache name. Defaults to `fetchbox-runtime`.
    #[serde(default)]
    pub cache_name: Option<String>,
    /// Match options for cache lookups.
    #[serde(default)]
    pub match_options: MatchOptions,
    /// Network timeout (e.g. "3s", "500ms").
    #[serde(default, with = "humantime_serde")]
    pub network_timeout: Option<Duration>,
    /// Serve data requests.
    #[serde(default)]
    pub loader: bool,
    /// Restrict which responses are written to the cache.
    #[serde(default)]
    pub cacheable: Option<CacheableConfig>,
}

impl StrategyConfig {
    /// Creates a strategy of `kind` with default settings.
    pub fn new(kind: StrategyType) -> Self {
        Self {
            kind,
            cache_name: None,
            match_options: MatchOptions::default(),
            network_timeout: None,
            loader: false,
            cacheable: None,
        }
    }

    /// Builds the strategy. `plugins` run after the configured ones.
    pub fn into_strategy(self, plugins: &[Arc<dyn Plugin>]) -> Result<Strategy, ConfigError> {
        let mut options = StrategyOptions::default().match_options(self.match_options);
        if let Some(cache_name) = self.cache_name {
            options = options.cache_name(cache_name);
        }
        if let Some(timeout) = self.network_timeout {
            options = options.network_timeout(timeout);
        }
        if let Some(cacheable) = self.cacheable {
            options = options.plugin(cacheable.into_plugin()?);
        }
        if self.loader {
            options = options.loader(true).plugin(LoaderPlugin);
        }
        options = options.plugins(plugins.iter().cloned());
        Ok(Strategy::new(self.kind.into(), options))
    }
}

/// A configured route.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RouteConfig {
    /// What the route matches.
    pub capture: CaptureConfig,
    /// Method the route is registered for.
    #[serde(default)]
    pub method: HttpMethod,
    /// Strategy handling matched requests.
    pub strategy: StrategyConfig,
}

/// A configured router.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct RouterConfig {
    /// Routes in priority order.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Strategy for unmatched `GET` requests.
    #[serde(default)]
    pub default: Option<StrategyConfig>,
}

impl RouterConfig {
    /// Builds a router for `origin`, sharing `plugins` across every strategy.
    pub fn into_router(
        self,
        origin: Url,
        plugins: Vec<Arc<dyn Plugin>>,
    ) -> Result<Router, ConfigError> {
        let mut router = Router::new(origin);
        for route in self.routes {
            let strategy = route.strategy.into_strategy(&plugins)?;
            router.register(route.capture.into_capture()?, strategy, route.method.into())?;
        }
        if let Some(default) = self.default {
            router.set_default_handler(default.into_strategy(&plugins)?, Method::GET);
        }
        Ok(router)
    }
}
