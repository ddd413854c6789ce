//! Process-local utility helpers.
//!
//! The centerpiece is [`cache()`], a memoizing wrapper for synchronous and
//! asynchronous functions keyed by the serialized call arguments. Around it
//! sit subprocess helpers ([`process`]), path helpers ([`paths`]), tarball
//! helpers ([`archive`]) and the usual configuration, logging and error
//! plumbing.

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod process;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{
    cache, cache_async, try_cache, try_cache_async, AsyncCached, CallConvention, CallKey, Cached,
    MemoStats,
};
pub use config::{CacheConfig, Config};
pub use error::{HutiError, Result};
