//! Suspendable memoized wrapper.
//!
//! Key derivation and table access happen synchronously; the only await point
//! in `call` is the wrapped future itself. Dropping the returned future before
//! it completes stores nothing. Identical calls that are in flight at the same
//! time each run the function: there is no de-duplication.

use std::borrow::Cow;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;

use serde::Serialize;
use tracing::debug;

use super::memo::{MemoStats, MemoTable};
use super::{prepare, settle, CallConvention};
use crate::config::CacheConfig;

/// An async function with a memo table in front of it.
///
/// The returned futures borrow a `!Sync` table, so they are `!Send`: drive
/// them on a current-thread runtime or a `LocalSet`.
pub struct AsyncCached<F, A, R> {
    func: F,
    name: Cow<'static, str>,
    enabled: bool,
    store_if: fn(&R) -> bool,
    memo: MemoTable<R>,
    _args: PhantomData<fn(A)>,
}

impl<F, Fut, A, R> AsyncCached<F, A, R>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = R>,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            name: Cow::Borrowed(std::any::type_name::<F>()),
            enabled: true,
            store_if: |_| true,
            memo: MemoTable::new(),
            _args: PhantomData,
        }
    }

    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn store_if(mut self, keep: fn(&R) -> bool) -> Self {
        self.store_if = keep;
        self
    }

    pub fn with_config(self, config: &CacheConfig) -> Self {
        self.enabled(config.enabled)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn convention(&self) -> CallConvention {
        CallConvention::Suspendable
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    pub fn stats(&self) -> MemoStats {
        self.memo.stats()
    }
}

impl<F, Fut, A, R> AsyncCached<F, A, R>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = R>,
    A: Serialize + Debug,
    R: Clone,
{
    pub async fn call(&self, args: A) -> R {
        let key = prepare(&self.name, self.enabled, &self.memo, &args);
        if let Some(key) = &key {
            if let Some(hit) = self.memo.lookup(key, |stored| Some(stored.clone())) {
                debug!(function = %self.name, key = %key.short(), "Cache hit");
                return hit;
            }
            debug!(function = %self.name, key = %key.short(), "Cache miss");
        }
        let value = (self.func)(args).await;
        if let Some(key) = key {
            settle(&self.name, &self.memo, self.store_if, key, value.clone());
        }
        value
    }
}

impl<F, Fut, A, T, E> AsyncCached<F, A, Result<T, E>>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    A: Serialize + Debug,
    T: Clone,
{
    /// Only `Ok` values are stored; an `Err` is returned as is.
    pub async fn try_call(&self, args: A) -> Result<T, E> {
        let key = prepare(&self.name, self.enabled, &self.memo, &args);
        if let Some(key) = &key {
            if let Some(hit) = self.memo.lookup(key, |stored| stored.as_ref().ok().cloned()) {
                debug!(function = %self.name, key = %key.short(), "Cache hit");
                return Ok(hit);
            }
            debug!(function = %self.name, key = %key.short(), "Cache miss");
        }
        let value = (self.func)(args).await?;
        if let Some(key) = key {
            settle(&self.name, &self.memo, self.store_if, key, Ok(value.clone()));
        }
        Ok(value)
    }
}
