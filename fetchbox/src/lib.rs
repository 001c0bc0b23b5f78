#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Declarative router configuration.
///
/// [`RouterConfig`](config::RouterConfig) describes routes, their strategies and
/// the default strategy in YAML or any other serde format, and builds a
/// [`Router`].
pub mod config;

/// Error types for routing and strategy execution.
pub mod error;

/// Intercepted request events and host capabilities.
pub mod event;

/// Per-request strategy execution context.
pub mod handler;

/// Background work tracking.
pub mod keep_alive;

/// Metrics collection for strategies and cache writes.
///
/// When the `metrics` feature is enabled, this module provides counters for
/// strategy responses, network failures and cache writes, and a gauge of
/// background tasks in flight.
pub mod metrics;

/// Plugin pipeline and built-in plugins.
pub mod plugin;

/// Request routing.
pub mod routing;

/// Caching strategies.
pub mod strategy;

/// Synthesized responses and marker headers.
pub mod synthetic;

pub use error::{Error, RouteError};
pub use event::{FetchEvent, Scope};
pub use handler::StrategyHandler;
pub use plugin::{HookContext, HookKind, HookSet, Plugin};
pub use routing::{Capture, Handler, MatchResult, Route, RouteContext, Router};
pub use strategy::{Completion, HandleOptions, Strategy, StrategyKind, StrategyOptions};

pub use fetchbox_core::{
    CacheHandle, CacheStorage, Fetch, FetchError, MatchOptions, Request, RequestInfo,
    RequestMode, Response, ResponseType,
};

/// The `fetchbox` prelude.
pub mod prelude {
    pub use crate::plugin::{CacheableResponsePlugin, LoaderPlugin};
    pub use crate::routing::{handler_fn, matchers};
    pub use crate::{
        Capture, Error, FetchEvent, Handler, Plugin, Request, Response, Router, Scope, Strategy,
        StrategyOptions,
    };
}
