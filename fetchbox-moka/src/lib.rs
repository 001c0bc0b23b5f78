#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod cache;
pub mod metrics;
mod storage;

pub use builder::MokaCacheStorageBuilder;
pub use cache::MokaCache;
pub use storage::MokaCacheStorage;
