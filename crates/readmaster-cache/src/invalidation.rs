//! Pattern and entity invalidation.

use crate::keys::{self, Namespace};
use crate::metrics::CacheMetrics;
use crate::service::report;
use crate::{CacheService, KeyScanner};
use std::fmt::Display;
use tracing::debug;

impl CacheService {
    /// Delete every key matching a glob pattern. Returns how many were deleted.
    ///
    /// All pages are collected before a single batch delete, so the matched
    /// set is held in memory; keep patterns scoped to one entity. A scan
    /// failure deletes nothing and returns 0.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let Some(store) = self.store() else {
            return 0;
        };

        let matched = match KeyScanner::new(store.as_ref(), pattern, self.scan_count())
            .collect_keys()
            .await
        {
            Ok(keys) => keys,
            Err(e) => {
                report("invalidate_pattern", pattern, &e);
                return 0;
            }
        };

        if matched.is_empty() {
            debug!(pattern = %pattern, "No cache keys matched");
            return 0;
        }

        let deleted = self.delete("invalidate_pattern", &matched).await;
        CacheMetrics::invalidated(deleted);
        debug!(pattern = %pattern, matched = matched.len(), deleted, "Cache pattern invalidated");
        deleted
    }

    /// Delete an explicit set of keys in one batch.
    pub async fn invalidate_keys(&self, keys: &[String]) -> u64 {
        let deleted = self.delete("invalidate_keys", keys).await;
        CacheMetrics::invalidated(deleted);
        deleted
    }

    /// Drop every entry that refers to a user.
    ///
    /// Covers both `user:<id>` and any key carrying the id as an inner segment.
    pub async fn invalidate_user_cache(&self, user_id: impl Display) -> u64 {
        self.invalidate_entity(Namespace::User, &user_id.to_string()).await
    }

    /// Drop every entry that refers to a book.
    ///
    /// Covers both `book:<id>` and any key carrying the id as an inner segment.
    pub async fn invalidate_book_cache(&self, book_id: impl Display) -> u64 {
        self.invalidate_entity(Namespace::Book, &book_id.to_string()).await
    }

    /// Drop one user's progress on one book, including its sub-keys.
    pub async fn invalidate_progress_cache(&self, user_id: impl Display, book_id: impl Display) -> u64 {
        let key = keys::progress_key(user_id, book_id);
        let nested = self
            .invalidate_pattern(&format!("{}{}*", keys::escape_glob(&key), keys::KEY_DELIMITER))
            .await;
        nested + self.invalidate_keys(&[key]).await
    }

    /// Drop every key in a namespace.
    pub async fn invalidate_namespace(&self, namespace: Namespace) -> u64 {
        self.invalidate_pattern(&namespace.pattern()).await
    }

    async fn invalidate_entity(&self, namespace: Namespace, id: &str) -> u64 {
        let nested = self.invalidate_pattern(&keys::id_segment_pattern(id)).await;
        let direct = self.invalidate_keys(&[keys::build_key(namespace, &[&id])]).await;
        nested + direct
    }

    /// Delete keys without waiting for the result. Failures are logged only.
    pub(crate) fn invalidate_in_background(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        let cache = self.clone();
        self.background().spawn("invalidate_keys", async move {
            cache.invalidate_keys(&keys).await;
        });
    }
}
