//! Tower middleware integration for fetchbox.
//!
//! This crate provides [`Intercept`], a Tower [`Layer`](tower::Layer) that
//! puts a fetchbox [`Router`](fetchbox::Router) in front of any Tower HTTP
//! service. The wrapped service becomes the network of every strategy, so a
//! `NetworkFirst` route calls it and falls back to the cache when it fails.
//!
//! # Request flow
//!
//! 1. The request body is buffered and the request is resolved against the
//!    router's origin.
//! 2. The router picks a route, or the default handler of the method.
//! 3. When neither applies, the request is forwarded to the inner service.
//! 4. Background work of the handled request (cache writes) finishes in a
//!    detached task; failures are logged.
//!
//! # Quick Start
//!
//! ```
//! use fetchbox::prelude::*;
//! use fetchbox_moka::MokaCacheStorage;
//! use fetchbox_tower::Intercept;
//! use http_body_util::Full;
//! use bytes::Bytes;
//! use tower::{ServiceBuilder, service_fn};
//! use url::Url;
//!
//! let mut router = Router::new(Url::parse("https://app.example.com/").unwrap());
//! router
//!     .register(
//!         Capture::callback(matchers::asset()),
//!         Strategy::cache_first(StrategyOptions::default()),
//!         http::Method::GET,
//!     )
//!     .unwrap();
//!
//! let service = ServiceBuilder::new()
//!     .layer(
//!         Intercept::builder()
//!             .router(router)
//!             .caches(MokaCacheStorage::new())
//!             .build(),
//!     )
//!     .service(service_fn(|_req: http::Request<Full<Bytes>>| async {
//!         Ok::<_, std::convert::Infallible>(http::Response::new(Full::new(Bytes::from("hello"))))
//!     }));
//! ```

#![warn(missing_docs)]

/// Future types for the intercept service.
pub mod future;
/// Tower layer and builder.
pub mod layer;
/// The Tower service routing requests.
pub mod service;
/// Network adapter for bridging Tower services to fetchbox.
pub mod upstream;

pub use layer::{Intercept, InterceptBuilder, NotSet};
pub use service::{InterceptBody, InterceptService};
pub use upstream::TowerFetch;
