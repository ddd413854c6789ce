//! Memoizing call cache.
//!
//! Wraps a function so that repeated calls with structurally equal arguments
//! return the stored result instead of running the function again. Arguments
//! are keyed through their `Serialize` impl (see [`CallKey`]); when that
//! fails the call runs uncached and a warning is logged.
//!
//! The calling convention is fixed when the wrapper is built: [`cache`]
//! produces a blocking [`Cached`], [`cache_async`] a suspendable
//! [`AsyncCached`] whose `call` must be awaited.
//!
//! ```rust
//! use std::cell::Cell;
//! use huti::cache::cache;
//!
//! let runs = Cell::new(0);
//! let square = cache(|n: u64| {
//!     runs.set(runs.get() + 1);
//!     n * n
//! });
//!
//! assert_eq!(square.call(12), 144);
//! assert_eq!(square.call(12), 144);
//! assert_eq!(runs.get(), 1);
//! ```
//!
//! Memo tables are unbounded: every distinct argument set stays cached for
//! the lifetime of the wrapper.

pub mod async_cached;
mod canonical;
pub mod key;
pub mod memo;
pub mod sync_cached;

use std::fmt::Debug;

use serde::Serialize;
use tracing::{debug, warn};

pub use async_cached::AsyncCached;
pub use key::{CallKey, KeyError};
pub use memo::{MemoStats, MemoTable};
pub use sync_cached::Cached;

/// How a wrapper is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConvention {
    /// `call` returns the value directly.
    Blocking,
    /// `call` returns a future that must be awaited.
    Suspendable,
}

/// Wrap a synchronous function.
pub fn cache<F, A, R>(func: F) -> Cached<F, A, R>
where
    F: Fn(A) -> R,
{
    Cached::new(func)
}

/// Wrap a fallible synchronous function; only `Ok` results are stored.
pub fn try_cache<F, A, T, E>(func: F) -> Cached<F, A, Result<T, E>>
where
    F: Fn(A) -> Result<T, E>,
{
    Cached::new(func).store_if(Result::is_ok)
}

/// Wrap an asynchronous function.
pub fn cache_async<F, Fut, A, R>(func: F) -> AsyncCached<F, A, R>
where
    F: Fn(A) -> Fut,
    Fut: std::future::Future<Output = R>,
{
    AsyncCached::new(func)
}

/// Wrap a fallible asynchronous function; only `Ok` results are stored.
pub fn try_cache_async<F, Fut, A, T, E>(func: F) -> AsyncCached<F, A, Result<T, E>>
where
    F: Fn(A) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    AsyncCached::new(func).store_if(Result::is_ok)
}

/// Derive the key for one call, or decide to bypass the table.
///
/// Never fails: a derivation error is logged and turns into `None`.
fn prepare<A, R>(function: &str, enabled: bool, memo: &MemoTable<R>, args: &A) -> Option<CallKey>
where
    A: Serialize + Debug,
{
    if !enabled {
        memo.record_bypass();
        return None;
    }
    match CallKey::derive(args) {
        Ok(key) => Some(key),
        Err(error) => {
            warn!(function = %function, args = ?args, error = %error, "Not cached");
            memo.record_bypass();
            None
        }
    }
}

/// Store `value` under `key` unless `keep` rejects it.
fn settle<R>(
    function: &str,
    memo: &MemoTable<R>,
    keep: fn(&R) -> bool,
    key: CallKey,
    value: R,
) {
    if keep(&value) {
        memo.store(key, value);
    } else {
        debug!(function = %function, key = %key.short(), "Result not stored");
    }
}
