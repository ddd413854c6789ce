//! Blocking memoized wrapper.

use std::borrow::Cow;
use std::fmt::Debug;
use std::marker::PhantomData;

use serde::Serialize;
use tracing::debug;

use super::memo::{MemoStats, MemoTable};
use super::{prepare, settle, CallConvention};
use crate::config::CacheConfig;

/// A synchronous function with a memo table in front of it.
pub struct Cached<F, A, R> {
    func: F,
    name: Cow<'static, str>,
    enabled: bool,
    store_if: fn(&R) -> bool,
    memo: MemoTable<R>,
    _args: PhantomData<fn(A)>,
}

impl<F, A, R> Cached<F, A, R>
where
    F: Fn(A) -> R,
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

    /// Name reported in diagnostics. Defaults to the function's type name.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// A disabled wrapper always runs the function and stores nothing.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Only results accepted by `keep` are stored; the rest are returned
    /// without touching the table.
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
        CallConvention::Blocking
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

impl<F, A, R> Cached<F, A, R>
where
    F: Fn(A) -> R,
    A: Serialize + Debug,
    R: Clone,
{
    /// Call through the cache.
    ///
    /// Every returned value passing [`store_if`](Self::store_if) is stored.
    /// Wrappers built with [`try_cache`](super::try_cache) keep `Ok` only.
    /// A panic in the function unwinds before anything is stored.
    pub fn call(&self, args: A) -> R {
        let key = prepare(&self.name, self.enabled, &self.memo, &args);
        if let Some(key) = &key {
            if let Some(hit) = self.memo.lookup(key, |stored| Some(stored.clone())) {
                debug!(function = %self.name, key = %key.short(), "Cache hit");
                return hit;
            }
            debug!(function = %self.name, key = %key.short(), "Cache miss");
        }
        let value = (self.func)(args);
        if let Some(key) = key {
            settle(&self.name, &self.memo, self.store_if, key, value.clone());
        }
        value
    }
}

impl<F, A, T, E> Cached<F, A, Result<T, E>>
where
    F: Fn(A) -> Result<T, E>,
    A: Serialize + Debug,
    T: Clone,
{
    /// Call a fallible function through the cache.
    ///
    /// Only `Ok` values are stored. An `Err` is returned unchanged and the
    /// next identical call runs the function again.
    pub fn try_call(&self, args: A) -> Result<T, E> {
        let key = prepare(&self.name, self.enabled, &self.memo, &args);
        if let Some(key) = &key {
            if let Some(hit) = self.memo.lookup(key, |stored| stored.as_ref().ok().cloned()) {
                debug!(function = %self.name, key = %key.short(), "Cache hit");
                return Ok(hit);
            }
            debug!(function = %self.name, key = %key.short(), "Cache miss");
        }
        let value = (self.func)(args)?;
        if let Some(key) = key {
            settle(&self.name, &self.memo, self.store_if, key, Ok(value.clone()));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{cache, try_cache};
    use crate::test_support::capture_events;
    use serde::ser::{Error as _, Serializer};
    use serde_json::{json, Value};
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    /// Stands in for an open resource handle.
    #[derive(Debug, Clone, PartialEq)]
    struct Handle(u32);

    impl Serialize for Handle {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("open handle"))
        }
    }

    #[test]
    fn test_identical_calls_execute_once() {
        let calls = Cell::new(0);
        let echo = cache(|x: Value| {
            calls.set(calls.get() + 1);
            x
        });
        assert_eq!(echo.call(json!({})), json!({}));
        assert_eq!(echo.call(json!({})), json!({}));
        assert_eq!(calls.get(), 1);
        assert_eq!(echo.len(), 1);
    }

    #[test]
    fn test_distinct_arguments_each_execute() {
        let calls = Cell::new(0);
        let add = cache(|(a, b): (i64, i64)| {
            calls.set(calls.get() + 1);
            a + b
        });
        assert_eq!(add.call((1, 2)), 3);
        assert_eq!(add.call((2, 1)), 3);
        assert_eq!(add.call((1, 2)), 3);
        assert_eq!(calls.get(), 2);
        let stats = add.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_counter_side_effect_happens_once() {
        let counter = Cell::new(0u32);
        let bump = cache(|_label: &'static str| {
            counter.set(counter.get() + 1);
            counter.get()
        });
        assert_eq!(bump.call("a"), 1);
        assert_eq!(bump.call("a"), 1);
        assert_eq!(bump.call("b"), 2);
    }

    #[test]
    fn test_unserializable_argument_never_cached() {
        let calls = Cell::new(0);
        let echo = cache(|h: Handle| {
            calls.set(calls.get() + 1);
            h
        })
        .named("echo");

        let events = capture_events(|| {
            assert_eq!(echo.call(Handle(1)), Handle(1));
            assert_eq!(echo.call(Handle(1)), Handle(1));
        });

        assert_eq!(calls.get(), 2);
        assert!(echo.is_empty());
        assert_eq!(echo.stats().bypassed, 2);

        let warnings: Vec<_> = events
            .iter()
            .filter(|e| e.level == tracing::Level::WARN)
            .collect();
        assert_eq!(warnings.len(), 2);
        for event in warnings {
            assert_eq!(event.message, "Not cached");
            assert_eq!(event.field("function"), Some("echo"));
            assert_eq!(event.field("args"), Some("Handle(1)"));
            assert!(event.field("error").unwrap().contains("open handle"));
        }
    }

    #[test]
    fn test_bypass_is_per_call() {
        let calls = Cell::new(0);
        let f = cache(|arg: Result<u8, Handle>| {
            calls.set(calls.get() + 1);
            arg.is_ok()
        });
        assert!(!f.call(Err(Handle(0))));
        assert!(f.call(Ok(5)));
        assert!(f.call(Ok(5)));
        assert_eq!(calls.get(), 2);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_try_call_does_not_cache_errors() {
        let calls = Cell::new(0);
        let parse = cache(|s: String| {
            calls.set(calls.get() + 1);
            s.parse::<i32>()
        });

        assert!(parse.try_call("nope".into()).is_err());
        assert!(parse.try_call("nope".into()).is_err());
        assert_eq!(calls.get(), 2);
        assert!(parse.is_empty());

        assert_eq!(parse.try_call("42".into()), Ok(42));
        assert_eq!(parse.try_call("42".into()), Ok(42));
        assert_eq!(calls.get(), 3);
        assert_eq!(parse.len(), 1);
    }

    #[test]
    fn test_panic_propagates_and_stores_nothing() {
        let calls = Cell::new(0);
        let boom = cache(|n: u8| {
            calls.set(calls.get() + 1);
            if n == 0 {
                panic!("zero");
            }
            n
        });
        let result = catch_unwind(AssertUnwindSafe(|| boom.call(0)));
        assert!(result.is_err());
        assert!(boom.is_empty());
        let result = catch_unwind(AssertUnwindSafe(|| boom.call(0)));
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_disabled_wrapper_always_executes() {
        let calls = Cell::new(0);
        let f = cache(|x: u8| {
            calls.set(calls.get() + 1);
            x
        })
        .with_config(&CacheConfig { enabled: false });

        let events = capture_events(|| {
            f.call(1);
            f.call(1);
        });
        assert_eq!(calls.get(), 2);
        assert!(f.is_empty());
        assert!(events.iter().all(|e| e.level != tracing::Level::WARN));
    }

    #[test]
    fn test_default_name_and_convention() {
        let f = cache(|x: u8| x);
        assert!(f.name().contains("closure"));
        assert_eq!(f.convention(), CallConvention::Blocking);
        let f = f.named("identity");
        assert_eq!(f.name(), "identity");
    }

    #[test]
    fn test_wraps_plain_fn_items() {
        fn double(x: u32) -> u32 {
            x * 2
        }
        let f = cache(double);
        assert_eq!(f.call(4), 8);
        assert_eq!(f.call(4), 8);
        assert_eq!(f.stats().hits, 1);
    }

    #[test]
    fn test_empty_and_non_finite_arguments_do_not_collide() {
        let calls = Cell::new(0);
        let describe = cache(|x: Option<Option<f64>>| {
            calls.set(calls.get() + 1);
            format!("{x:?}")
        });
        assert_eq!(describe.call(None), "None");
        assert_eq!(describe.call(Some(None)), "Some(None)");
        assert_eq!(describe.call(Some(Some(f64::INFINITY))), "Some(Some(inf))");
        assert_eq!(describe.call(Some(Some(f64::NEG_INFINITY))), "Some(Some(-inf))");
        assert_eq!(describe.call(Some(Some(f64::NAN))), "Some(Some(NaN))");
        assert_eq!(calls.get(), 5);
        assert_eq!(describe.len(), 5);

        assert_eq!(describe.call(Some(Some(f64::NAN))), "Some(Some(NaN))");
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn test_try_cache_call_does_not_store_errors() {
        let calls = Cell::new(0);
        let parse = try_cache(|s: &'static str| {
            calls.set(calls.get() + 1);
            s.parse::<i32>()
        })
        .named("parse");

        let events = capture_events(|| {
            assert!(parse.call("nope").is_err());
            assert!(parse.call("nope").is_err());
        });
        assert_eq!(calls.get(), 2);
        assert!(parse.is_empty());
        let skipped = events
            .iter()
            .filter(|e| e.message == "Result not stored")
            .count();
        assert_eq!(skipped, 2);

        assert_eq!(parse.call("7"), Ok(7));
        assert_eq!(parse.call("7"), Ok(7));
        assert_eq!(calls.get(), 3);
        assert_eq!(parse.len(), 1);
    }

    #[test]
    fn test_store_if_predicate() {
        let calls = Cell::new(0);
        let f = cache(|x: u32| {
            calls.set(calls.get() + 1);
            x % 3
        })
        .store_if(|r| *r != 0);
        f.call(3);
        f.call(3);
        f.call(4);
        f.call(4);
        assert_eq!(calls.get(), 3);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_miss_and_hit_events() {
        let f = cache(|x: u8| x).named("ident");
        let events = capture_events(|| {
            f.call(1);
            f.call(1);
        });
        let debug: Vec<_> = events
            .iter()
            .filter(|e| e.level == tracing::Level::DEBUG)
            .collect();
        assert_eq!(debug.len(), 2);
        assert_eq!(debug[0].message, "Cache miss");
        assert_eq!(debug[1].message, "Cache hit");
        assert_eq!(debug[0].field("function"), Some("ident"));
        assert_eq!(debug[0].field("key"), debug[1].field("key"));
    }
}
