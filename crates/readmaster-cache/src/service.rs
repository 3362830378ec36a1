//! Core and advanced cache operations.
//!
//! Every public method here returns a safe default instead of an error.
//! Transport and (de)serialization failures are logged with the operation
//! name and key, counted, and swallowed.

use crate::background::BackgroundTasks;
use crate::metrics::CacheMetrics;
use crate::store::{CacheStore, SetOptions, TtlStatus};
use crate::{CacheClient, CacheError, CacheResult, Expiry};
use readmaster_config::CacheConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Default `COUNT` hint for key scans.
pub(crate) const DEFAULT_SCAN_COUNT: u32 = 100;

/// Options for [`CacheService::get_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// On a hit, reset the key's expiry to this duration.
    pub refresh_ttl: Option<Duration>,
}

impl GetOptions {
    /// Refresh the TTL of the key on every hit.
    #[must_use]
    pub fn refresh_ttl(ttl: impl Into<Duration>) -> Self {
        Self {
            refresh_ttl: Some(ttl.into()),
        }
    }
}

/// Cache-aside service over a [`CacheClient`].
///
/// Cheap to clone; clones share the client and the background task tracker.
#[derive(Clone)]
pub struct CacheService {
    client: Arc<CacheClient>,
    background: BackgroundTasks,
    scan_count: u32,
}

impl CacheService {
    /// Create a service over a shared client.
    #[must_use]
    pub fn new(client: Arc<CacheClient>) -> Self {
        Self {
            client,
            background: BackgroundTasks::default(),
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }

    /// Create a service whose client initializes lazily from `config`.
    #[must_use]
    pub fn from_config(config: CacheConfig) -> Self {
        let scan_count = config.scan_count;
        Self::new(Arc::new(CacheClient::new(config))).with_scan_count(scan_count)
    }

    /// Create a service over an already-constructed store.
    #[must_use]
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self::new(Arc::new(CacheClient::with_store(store)))
    }

    /// Set the `COUNT` hint used when scanning for pattern invalidation.
    #[must_use]
    pub fn with_scan_count(mut self, count: u32) -> Self {
        self.scan_count = count.max(1);
        self
    }

    /// The underlying client accessor.
    #[must_use]
    pub fn client(&self) -> &Arc<CacheClient> {
        &self.client
    }

    /// Whether the store is configured and its client was constructed.
    pub fn is_available(&self) -> bool {
        self.client.is_available()
    }

    /// Wait for background population and invalidation to finish.
    pub async fn settle(&self) {
        self.background.settle().await;
    }

    /// Probe the store. False when unavailable or unreachable.
    pub async fn ping(&self) -> bool {
        let Some(store) = self.store() else {
            return false;
        };
        match timed("ping", store.ping()).await {
            Ok(pong) => pong,
            Err(e) => {
                report("ping", "", &e);
                false
            }
        }
    }

    pub(crate) fn store(&self) -> Option<Arc<dyn CacheStore>> {
        self.client.client()
    }

    pub(crate) fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    pub(crate) fn scan_count(&self) -> u32 {
        self.scan_count
    }

    // ------------------------------------------------------------------
    // Core operations
    // ------------------------------------------------------------------

    /// Read and decode a value. `None` on miss, on failure, or when
    /// the stored text does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_with(key, GetOptions::default()).await
    }

    /// Like [`get`](Self::get), optionally refreshing the TTL on a hit.
    ///
    /// A failed refresh is logged and does not affect the returned value.
    pub async fn get_with<T: DeserializeOwned>(&self, key: &str, options: GetOptions) -> Option<T> {
        let store = self.store()?;

        let raw = match timed("get", store.get(key)).await {
            Ok(raw) => raw,
            Err(e) => {
                report("get", key, &e);
                return None;
            }
        };

        let Some(raw) = raw else {
            CacheMetrics::miss("get");
            debug!(key = %key, "Cache miss");
            return None;
        };

        let value = match serde_json::from_str::<T>(&raw) {
            Ok(value) => value,
            Err(e) => {
                report("get", key, &CacheError::from(e));
                return None;
            }
        };
        CacheMetrics::hit("get");
        debug!(key = %key, "Cache hit");

        if let Some(ttl) = options.refresh_ttl {
            if let Err(e) = store.expire(key, ttl.as_secs()).await {
                warn!(key = %key, error = %e, "Failed to refresh cache TTL");
            }
        }

        Some(value)
    }

    /// Encode and write a value. Returns whether the write took effect;
    /// an unmet `NX`/`XX` condition is `false`, not an error.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) -> bool {
        let Some(store) = self.store() else {
            return false;
        };

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                report("set", key, &CacheError::from(e));
                return false;
            }
        };

        match timed("set", store.set(key, &raw, options)).await {
            Ok(written) => {
                debug!(key = %key, written, ?options, "Cache set");
                written
            }
            Err(e) => {
                report("set", key, &e);
                false
            }
        }
    }

    /// Delete one key. True if it existed.
    pub async fn del(&self, key: &str) -> bool {
        self.delete("del", &[key.to_owned()]).await > 0
    }

    /// Delete several keys in one call. Returns how many existed.
    pub async fn del_many(&self, keys: &[String]) -> u64 {
        self.delete("del_many", keys).await
    }

    pub(crate) async fn delete(&self, op: &'static str, keys: &[String]) -> u64 {
        if keys.is_empty() {
            return 0;
        }
        let Some(store) = self.store() else {
            return 0;
        };

        match timed(op, store.del(keys)).await {
            Ok(deleted) => {
                debug!(requested = keys.len(), deleted, "Cache keys deleted");
                deleted
            }
            Err(e) => {
                report(op, &keys.join(","), &e);
                0
            }
        }
    }

    /// Whether the key exists.
    pub async fn exists(&self, key: &str) -> bool {
        let Some(store) = self.store() else {
            return false;
        };
        match timed("exists", store.exists(key)).await {
            Ok(found) => found,
            Err(e) => {
                report("exists", key, &e);
                false
            }
        }
    }

    /// Set the key's expiry in whole seconds. False when the key does not exist.
    ///
    /// A zero duration expires the key at once, as `EXPIRE key 0` does.
    pub async fn expire(&self, key: &str, ttl: impl Into<Duration>) -> bool {
        let Some(store) = self.store() else {
            return false;
        };
        let seconds = ttl.into().as_secs();
        match timed("expire", store.expire(key, seconds)).await {
            Ok(applied) => applied,
            Err(e) => {
                report("expire", key, &e);
                false
            }
        }
    }

    /// Remaining lifetime of the key.
    ///
    /// [`TtlStatus::Missing`] covers both an absent key and an unreachable store.
    pub async fn ttl(&self, key: &str) -> TtlStatus {
        let Some(store) = self.store() else {
            return TtlStatus::Missing;
        };
        match timed("ttl", store.ttl(key)).await {
            Ok(raw) => TtlStatus::from_raw(raw),
            Err(e) => {
                report("ttl", key, &e);
                TtlStatus::Missing
            }
        }
    }

    // ------------------------------------------------------------------
    // Advanced operations
    // ------------------------------------------------------------------

    /// Cache-aside read.
    ///
    /// On a hit the fetcher is never called. On a miss the fetcher's value is
    /// returned immediately and written back in the background; a failed
    /// write is logged and never retried. Concurrent misses on the same key
    /// each run the fetcher and the last write wins.
    ///
    /// Fetcher errors are returned unchanged and nothing is cached.
    pub async fn get_or_set<T, E, F, Fut>(&self, key: &str, ttl: impl Into<Expiry>, fetcher: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = fetcher().await?;
        self.populate(key, &value, ttl.into());
        Ok(value)
    }

    fn populate<T: Serialize + ?Sized>(&self, key: &str, value: &T, expiry: Expiry) {
        let Some(store) = self.store() else {
            return;
        };

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                report("get_or_set", key, &CacheError::from(e));
                return;
            }
        };

        let key = key.to_owned();
        self.background.spawn("get_or_set", async move {
            match timed("get_or_set", store.set(&key, &raw, SetOptions::ttl(expiry))).await {
                Ok(_) => debug!(key = %key, "Cache populated"),
                Err(e) => report("get_or_set", &key, &e),
            }
        });
    }

    /// Read several keys in one call.
    ///
    /// The result always has one slot per requested key, in order. Slots are
    /// `None` on miss or on decode failure; every slot is `None` when the
    /// store is unavailable or the call fails.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[String]) -> Vec<Option<T>> {
        if keys.is_empty() {
            return Vec::new();
        }
        let Some(store) = self.store() else {
            return empty_slots(keys.len());
        };

        let raw = match timed("mget", store.mget(keys)).await {
            Ok(raw) if raw.len() == keys.len() => raw,
            Ok(raw) => {
                let e = CacheError::unexpected(
                    "MGET",
                    format!("requested {} keys, got {} values", keys.len(), raw.len()),
                );
                report("mget", &keys.join(","), &e);
                return empty_slots(keys.len());
            }
            Err(e) => {
                report("mget", &keys.join(","), &e);
                return empty_slots(keys.len());
            }
        };

        keys.iter()
            .zip(raw)
            .map(|(key, slot)| {
                let raw = slot?;
                match serde_json::from_str(&raw) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        report("mget", key, &CacheError::from(e));
                        None
                    }
                }
            })
            .collect()
    }

    /// Write several entries in one call.
    ///
    /// The bulk write carries no expiry, so an expiry is applied in a second
    /// pipelined pass. Once the values are written this returns true even if
    /// that pass fails; the failure is logged once for the whole batch and
    /// nothing is rolled back.
    pub async fn mset<T: Serialize>(&self, entries: &[(String, T)], ttl: impl Into<Expiry>) -> bool {
        if entries.is_empty() {
            return true;
        }
        let Some(store) = self.store() else {
            return false;
        };

        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::to_string(value) {
                Ok(raw) => encoded.push((key.clone(), raw)),
                Err(e) => {
                    report("mset", key, &CacheError::from(e));
                    return false;
                }
            }
        }

        if let Err(e) = timed("mset", store.mset(&encoded)).await {
            report("mset", &joined_keys(&encoded), &e);
            return false;
        }

        if let Some(seconds) = ttl.into().seconds() {
            let keys: Vec<String> = encoded.into_iter().map(|(key, _)| key).collect();
            match timed("mset", store.expire_many(&keys, seconds)).await {
                Ok(applied) => {
                    let missed = applied.iter().filter(|ok| !**ok).count();
                    if missed > 0 {
                        warn!(count = keys.len(), missed, "Cache TTL not applied to every mset key");
                    }
                }
                Err(e) => {
                    warn!(count = keys.len(), error = %e, "Failed to apply TTL after mset; values kept without expiry");
                }
            }
        }

        true
    }

    /// Increment by one.
    pub async fn incr(&self, key: &str) -> Option<i64> {
        self.incr_by(key, 1).await
    }

    /// Increment by `amount`. `None` on failure.
    pub async fn incr_by(&self, key: &str, amount: i64) -> Option<i64> {
        let store = self.store()?;
        let result = if amount == 1 {
            timed("incr", store.incr(key)).await
        } else {
            timed("incr", store.incr_by(key, amount)).await
        };
        result.map_err(|e| report("incr", key, &e)).ok()
    }

    /// Decrement by one.
    pub async fn decr(&self, key: &str) -> Option<i64> {
        self.decr_by(key, 1).await
    }

    /// Decrement by `amount`. `None` on failure.
    pub async fn decr_by(&self, key: &str, amount: i64) -> Option<i64> {
        let store = self.store()?;
        let result = if amount == 1 {
            timed("decr", store.decr(key)).await
        } else {
            timed("decr", store.decr_by(key, amount)).await
        };
        result.map_err(|e| report("decr", key, &e)).ok()
    }
}

/// Await a store call and record its duration.
pub(crate) async fn timed<T>(op: &'static str, call: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
    let started = Instant::now();
    let result = call.await;
    CacheMetrics::operation(op, started.elapsed());
    result
}

/// Log and count a swallowed failure.
pub(crate) fn report(op: &'static str, key: &str, err: &CacheError) {
    CacheMetrics::error(op);
    error!(op, key = %key, error = %err, "Cache operation failed");
}

fn empty_slots<T>(len: usize) -> Vec<Option<T>> {
    std::iter::repeat_with(|| None).take(len).collect()
}

fn joined_keys(entries: &[(String, String)]) -> String {
    entries
        .iter()
        .map(|(key, _)| key.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
