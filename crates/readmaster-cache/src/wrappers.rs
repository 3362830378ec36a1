//! Add caching or invalidation to an existing async function.
//!
//! Wrapped functions take their arguments as a single value; use a tuple
//! for more than one.
//!
//! ```ignore
//! let load_book = with_cache(
//!     &cache,
//!     |id: &String| keys::book_key(id, &[]),
//!     |id: String| async move { repo.find_book(&id).await },
//!     CacheTtl::Long,
//! );
//! let book = load_book.call("abc123".to_string()).await?;
//! ```

use crate::{CacheService, Expiry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use tracing::debug;

/// A function whose results are cached under a key derived from its arguments.
pub struct CachedFn<A, K, F> {
    cache: CacheService,
    key_fn: K,
    fetch: F,
    expiry: Expiry,
    _args: PhantomData<fn(A)>,
}

impl<A, K, F> CachedFn<A, K, F>
where
    K: Fn(&A) -> String,
{
    /// Call through the cache; see [`CacheService::get_or_set`].
    pub async fn call<T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        let key = (self.key_fn)(&args);
        self.cache
            .get_or_set(&key, self.expiry, || (self.fetch)(args))
            .await
    }

    /// The key a call with `args` would use.
    pub fn key_for(&self, args: &A) -> String {
        (self.key_fn)(args)
    }
}

/// Wrap `fetch` so each call goes through [`CacheService::get_or_set`]
/// under the key `key_fn` derives from the arguments.
pub fn with_cache<A, K, F, Fut, T, E>(
    cache: &CacheService,
    key_fn: K,
    fetch: F,
    ttl: impl Into<Expiry>,
) -> CachedFn<A, K, F>
where
    K: Fn(&A) -> String,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize + DeserializeOwned,
{
    CachedFn {
        cache: cache.clone(),
        key_fn,
        fetch,
        expiry: ttl.into(),
        _args: PhantomData,
    }
}

/// Keys to drop after a successful mutation.
pub enum InvalidationKeys<A> {
    /// The same keys on every call.
    Static(Vec<String>),
    /// Keys derived from the call arguments.
    Computed(Box<dyn Fn(&A) -> Vec<String> + Send + Sync>),
}

impl<A> InvalidationKeys<A> {
    /// Derive keys from the call arguments.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&A) -> Vec<String> + Send + Sync + 'static,
    {
        Self::Computed(Box::new(f))
    }

    fn resolve(&self, args: &A) -> Vec<String> {
        match self {
            Self::Static(keys) => keys.clone(),
            Self::Computed(derive) => derive(args),
        }
    }
}

impl<A> From<Vec<String>> for InvalidationKeys<A> {
    fn from(keys: Vec<String>) -> Self {
        Self::Static(keys)
    }
}

impl<A> fmt::Debug for InvalidationKeys<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(keys) => f.debug_tuple("Static").field(keys).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A mutation that drops related cache entries once it succeeds.
pub struct InvalidatingFn<A, F> {
    cache: CacheService,
    keys: InvalidationKeys<A>,
    mutate: F,
}

impl<A, F> InvalidatingFn<A, F> {
    /// Run the mutation and return its result without waiting for invalidation.
    ///
    /// Keys are resolved from the arguments before the call. Deletion runs in
    /// the background and only after `Ok`; its failures are logged only.
    pub async fn call<T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let keys = self.keys.resolve(&args);
        let result = (self.mutate)(args).await;
        if result.is_ok() {
            self.cache.invalidate_in_background(keys);
        } else {
            debug!(count = keys.len(), "Mutation failed; cache left intact");
        }
        result
    }
}

/// Wrap `mutate` so each successful call drops `keys` in the background.
pub fn with_invalidation<A, F, Fut, T, E>(
    cache: &CacheService,
    keys: impl Into<InvalidationKeys<A>>,
    mutate: F,
) -> InvalidatingFn<A, F>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    InvalidatingFn {
        cache: cache.clone(),
        keys: keys.into(),
        mutate,
    }
}
