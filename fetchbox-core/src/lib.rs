#![warn(missing_docs)]
//! # fetchbox-core
//!
//! Core values and capability traits for the fetchbox request interception
//! framework.
//!
//! This crate defines what the rest of fetchbox is written against:
//!
//! - **Values** exchanged at the proxy point ([`Request`], [`Response`], [`RequestInfo`])
//! - **Storage** of cached responses by request identity ([`CacheStorage`], [`CacheHandle`])
//! - **Network** access for cache misses and network-first policies ([`Fetch`])
//!
//! The storage engine and the network are supplied by the host. `fetchbox-moka`
//! provides an in-memory [`CacheStorage`], and `fetchbox-tower` turns any tower
//! service into a [`Fetch`].

pub mod fetch;
pub mod request;
pub mod response;
pub mod store;

pub use fetch::{Fetch, FetchError, FetchFn, fetch_fn};
pub use request::{Request, RequestInfo, RequestMode};
pub use response::{Response, ResponseType};
pub use store::{
    CacheHandle, CacheStorage, MatchOptions, MultiMatchOptions, StoreError, StoreResult,
};

/// Boxed error type used at capability boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
