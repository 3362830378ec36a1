//! In-process store with the same observable semantics as the remote ones.
//!
//! Backs the test suite and local development. Keys are kept sorted and a
//! `SCAN` cursor names the last key already returned, so a key that exists
//! for a whole iteration is returned even when other keys are deleted in
//! between pages. Expired entries are dropped lazily on access.

use super::{CacheStore, SetCondition, SetOptions};
use crate::{CacheError, CacheResult};
use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory cache store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    cursors: Mutex<HashMap<u64, String>>,
    last_cursor: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Whether the store holds no live keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every key.
    pub fn clear(&self) {
        self.entries.lock().clear();
        self.cursors.lock().clear();
    }

    fn live<'a>(entries: &'a mut BTreeMap<String, Entry>, key: &str, now: Instant) -> Option<&'a mut Entry> {
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn matcher(pattern: &str) -> CacheResult<GlobMatcher> {
        GlobBuilder::new(pattern)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map(|glob| glob.compile_matcher())
            .map_err(|e| CacheError::Remote(format!("ERR invalid pattern '{}': {}", pattern, e)))
    }

    fn add(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let (current, expires_at) = match Self::live(&mut entries, key, now) {
            Some(entry) => {
                let current = entry.value.parse::<i64>().map_err(|_| {
                    CacheError::Remote("ERR value is not an integer or out of range".to_string())
                })?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::Remote("ERR increment or decrement would overflow".to_string()))?;

        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}

fn deadline(now: Instant, seconds: Option<u64>) -> Option<Instant> {
    seconds.map(|secs| now + Duration::from_secs(secs))
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key, Instant::now()).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> CacheResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let present = Self::live(&mut entries, key, now).is_some();

        let allowed = match options.condition {
            SetCondition::Always => true,
            SetCondition::IfAbsent => !present,
            SetCondition::IfPresent => present,
        };
        if !allowed {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: deadline(now, options.expiry.seconds()),
            },
        );
        Ok(true)
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if entry.is_live(now) {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key, Instant::now()).is_some())
    }

    async fn expire(&self, key: &str, seconds: u64) -> CacheResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match Self::live(&mut entries, key, now) {
            Some(entry) => {
                entry.expires_at = deadline(now, Some(seconds));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(match Self::live(&mut entries, key, now) {
            None => -2,
            Some(Entry { expires_at: None, .. }) => -1,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at.saturating_duration_since(now);
                i64::try_from((remaining.as_millis() + 500) / 1000).unwrap_or(i64::MAX)
            }
        })
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(keys
            .iter()
            .map(|key| Self::live(&mut entries, key, now).map(|e| e.value.clone()))
            .collect())
    }

    async fn mset(&self, pairs: &[(String, String)]) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        for (key, value) in pairs {
            entries.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn expire_many(&self, keys: &[String], seconds: u64) -> CacheResult<Vec<bool>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(keys
            .iter()
            .map(|key| match Self::live(&mut entries, key, now) {
                Some(entry) => {
                    entry.expires_at = deadline(now, Some(seconds));
                    true
                }
                None => false,
            })
            .collect())
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.add(key, 1)
    }

    async fn incr_by(&self, key: &str, amount: i64) -> CacheResult<i64> {
        self.add(key, amount)
    }

    async fn decr(&self, key: &str) -> CacheResult<i64> {
        self.add(key, -1)
    }

    async fn decr_by(&self, key: &str, amount: i64) -> CacheResult<i64> {
        let delta = amount
            .checked_neg()
            .ok_or_else(|| CacheError::Remote("ERR decrement would overflow".to_string()))?;
        self.add(key, delta)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: u32) -> CacheResult<(u64, Vec<String>)> {
        let matcher = Self::matcher(pattern)?;
        let after = match cursor {
            0 => None,
            id => Some(
                self.cursors
                    .lock()
                    .remove(&id)
                    .ok_or_else(|| CacheError::Remote(format!("ERR invalid cursor {}", id)))?,
            ),
        };

        let now = Instant::now();
        let entries = self.entries.lock();
        let lower = after.as_deref().map_or(Unbounded, Excluded);

        let mut live = entries
            .range::<str, _>((lower, Unbounded))
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k);
        let examined: Vec<&String> = live.by_ref().take(count.max(1) as usize).collect();
        let exhausted = live.next().is_none();

        let page = examined
            .iter()
            .filter(|key| matcher.is_match(key.as_str()))
            .map(|key| (*key).clone())
            .collect();

        let next = match examined.last() {
            Some(last) if !exhausted => {
                let id = self.last_cursor.fetch_add(1, Ordering::Relaxed) + 1;
                self.cursors.lock().insert(id, (*last).clone());
                id
            }
            _ => 0,
        };

        Ok((next, page))
    }

    async fn ping(&self) -> CacheResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheTtl;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.set("k", "v", SetOptions::default()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_set() {
        let store = MemoryStore::new();
        assert!(!store.set("k", "v", SetOptions::default().if_present()).await.unwrap());
        assert!(store.set("k", "v1", SetOptions::default().if_absent()).await.unwrap());
        assert!(!store.set("k", "v2", SetOptions::default().if_absent()).await.unwrap());
        assert!(store.set("k", "v3", SetOptions::default().if_present()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v3".to_string()));
    }

    #[tokio::test]
    async fn test_ttl_reporting() {
        let store = MemoryStore::new();
        store.set("forever", "1", SetOptions::default()).await.unwrap();
        store.set("short", "1", SetOptions::ttl(CacheTtl::Short)).await.unwrap();

        assert_eq!(store.ttl("forever").await.unwrap(), -1);
        assert_eq!(store.ttl("short").await.unwrap(), 300);
        assert_eq!(store.ttl("missing").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_incr_preserves_expiry_and_rejects_non_integers() {
        let store = MemoryStore::new();
        store.set("n", "5", SetOptions::ttl(CacheTtl::Long)).await.unwrap();
        assert_eq!(store.incr_by("n", 10).await.unwrap(), 15);
        assert_eq!(store.decr("n").await.unwrap(), 14);
        assert_eq!(store.ttl("n").await.unwrap(), 3600);

        store.set("s", "\"text\"", SetOptions::default()).await.unwrap();
        assert!(matches!(store.incr("s").await, Err(CacheError::Remote(_))));
    }

    #[tokio::test]
    async fn test_scan_pages_until_cursor_returns_to_zero() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store.set(&format!("book:{}", i), "x", SetOptions::default()).await.unwrap();
            store.set(&format!("user:{}", i), "x", SetOptions::default()).await.unwrap();
        }

        let mut cursor = 0;
        let mut found = Vec::new();
        let mut pages = 0;
        loop {
            let (next, keys) = store.scan(cursor, "book:*", 10).await.unwrap();
            found.extend(keys);
            pages += 1;
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        assert_eq!(found.len(), 25);
        assert!(found.iter().all(|k| k.starts_with("book:")));
        assert_eq!(pages, 5);
    }

    #[tokio::test]
    async fn test_scan_returns_keys_that_survive_deletes_between_pages() {
        let store = MemoryStore::new();
        for i in 1..=5 {
            store.set(&format!("book:{}", i), "x", SetOptions::default()).await.unwrap();
        }

        let (mut cursor, mut seen) = store.scan(0, "book:*", 2).await.unwrap();
        assert_eq!(seen, vec!["book:1".to_string(), "book:2".to_string()]);
        store.del(&["book:1".to_string()]).await.unwrap();

        while cursor != 0 {
            let (next, keys) = store.scan(cursor, "book:*", 2).await.unwrap();
            seen.extend(keys);
            cursor = next;
        }
        assert_eq!(seen, vec!["book:1", "book:2", "book:3", "book:4", "book:5"]);
    }

    #[tokio::test]
    async fn test_scan_rejects_unknown_cursor() {
        let store = MemoryStore::new();
        assert!(matches!(store.scan(99, "*", 10).await, Err(CacheError::Remote(_))));
    }

    #[tokio::test]
    async fn test_scan_wildcard_segment() {
        let store = MemoryStore::new();
        for key in ["book:abc123", "book:abc123:progress", "progress:u1:abc123", "guide:abc123:toc"] {
            store.set(key, "x", SetOptions::default()).await.unwrap();
        }

        let (_, keys) = store.scan(0, "*:abc123:*", 100).await.unwrap();
        assert_eq!(keys, vec!["book:abc123:progress".to_string(), "guide:abc123:toc".to_string()]);
    }

    #[tokio::test]
    async fn test_del_counts_only_existing_keys() {
        let store = MemoryStore::new();
        store.set("a", "1", SetOptions::default()).await.unwrap();
        let deleted = store
            .del(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.is_empty());
    }
}
