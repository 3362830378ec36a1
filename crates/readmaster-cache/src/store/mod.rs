//! Store transports behind the cache layer.
//!
//! A [`CacheStore`] exposes the raw, string-valued primitives of a remote
//! key-value service and reports every failure. Degrading those failures
//! into safe defaults is the job of `CacheService`, not of the store.

mod memory;
mod redis_store;
mod upstash;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;
pub use self::upstash::UpstashStore;

use crate::{CacheResult, Expiry};
use async_trait::async_trait;
use readmaster_core::Interface;
use std::time::Duration;

/// Write predicate for `set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetCondition {
    /// Write unconditionally.
    #[default]
    Always,
    /// Write only if the key does not exist (`NX`).
    IfAbsent,
    /// Write only if the key already exists (`XX`).
    IfPresent,
}

impl SetCondition {
    /// The protocol flag for this condition, if any.
    #[must_use]
    pub const fn flag(self) -> Option<&'static str> {
        match self {
            Self::Always => None,
            Self::IfAbsent => Some("NX"),
            Self::IfPresent => Some("XX"),
        }
    }
}

/// Options for a single `set`.
///
/// `NX` and `XX` are one enum, so they cannot both be requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expiry: Expiry,
    pub condition: SetCondition,
}

impl SetOptions {
    /// Options with the given expiry and no write condition.
    #[must_use]
    pub fn ttl(expiry: impl Into<Expiry>) -> Self {
        Self {
            expiry: expiry.into(),
            condition: SetCondition::Always,
        }
    }

    /// Only write if the key is absent.
    #[must_use]
    pub const fn if_absent(mut self) -> Self {
        self.condition = SetCondition::IfAbsent;
        self
    }

    /// Only write if the key is present.
    #[must_use]
    pub const fn if_present(mut self) -> Self {
        self.condition = SetCondition::IfPresent;
        self
    }
}

/// Remaining lifetime of a key as reported by `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// The key expires after this long.
    Expiring(Duration),
    /// The key exists and has no expiry (`-1`).
    Persistent,
    /// The key does not exist, or the store could not be asked (`-2`).
    Missing,
}

impl TtlStatus {
    /// Interprets a raw `TTL` reply.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            -1 => Self::Persistent,
            secs if secs >= 0 => Self::Expiring(Duration::from_secs(secs.unsigned_abs())),
            _ => Self::Missing,
        }
    }

    /// The raw `TTL` reply this status corresponds to.
    #[must_use]
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Expiring(remaining) => i64::try_from(remaining.as_secs()).unwrap_or(i64::MAX),
            Self::Persistent => -1,
            Self::Missing => -2,
        }
    }
}

/// Raw primitives of the remote key-value store.
///
/// Values are opaque strings (JSON text written by `CacheService`).
/// Implementations must be safe for unlimited concurrent use.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Interface + Send + Sync {
    /// Short transport name for log lines.
    fn name(&self) -> &'static str;

    /// `GET key`
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// `SET key value [EX secs] [NX|XX]`; returns whether the write happened.
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> CacheResult<bool>;

    /// `DEL key...`; returns the number of keys removed.
    async fn del(&self, keys: &[String]) -> CacheResult<u64>;

    /// `EXISTS key`
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// `EXPIRE key secs`; false when the key does not exist.
    async fn expire(&self, key: &str, seconds: u64) -> CacheResult<bool>;

    /// `TTL key` as the raw integer reply.
    async fn ttl(&self, key: &str) -> CacheResult<i64>;

    /// `MGET key...`, one slot per requested key.
    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>>;

    /// `MSET key value...`
    async fn mset(&self, entries: &[(String, String)]) -> CacheResult<()>;

    /// One `EXPIRE` per key, sent as a single pipeline.
    async fn expire_many(&self, keys: &[String], seconds: u64) -> CacheResult<Vec<bool>>;

    /// `INCR key`
    async fn incr(&self, key: &str) -> CacheResult<i64>;

    /// `INCRBY key amount`
    async fn incr_by(&self, key: &str, amount: i64) -> CacheResult<i64>;

    /// `DECR key`
    async fn decr(&self, key: &str) -> CacheResult<i64>;

    /// `DECRBY key amount`
    async fn decr_by(&self, key: &str, amount: i64) -> CacheResult<i64>;

    /// `SCAN cursor MATCH pattern COUNT count`; returns the next cursor and a page of keys.
    ///
    /// A returned cursor of `0` means the iteration is complete.
    async fn scan(&self, cursor: u64, pattern: &str, count: u32) -> CacheResult<(u64, Vec<String>)>;

    /// `PING`
    async fn ping(&self) -> CacheResult<bool>;
}
