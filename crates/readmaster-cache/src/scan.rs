//! Cursor iteration over `SCAN`.

use crate::store::CacheStore;
use crate::CacheResult;
use futures::stream::{self, Stream};
use std::collections::HashSet;
use tracing::trace;

/// Pages through the keys matching a glob pattern.
///
/// Starts at cursor `0` and stops once the store hands cursor `0` back.
/// A page may be empty while the cursor is non-zero, and the store may
/// return the same key on more than one page.
pub struct KeyScanner<'a> {
    store: &'a dyn CacheStore,
    pattern: String,
    count: u32,
    cursor: u64,
    finished: bool,
}

impl<'a> KeyScanner<'a> {
    /// Create a scanner for `pattern` with the given `COUNT` hint.
    pub fn new(store: &'a dyn CacheStore, pattern: impl Into<String>, count: u32) -> Self {
        Self {
            store,
            pattern: pattern.into(),
            count: count.max(1),
            cursor: 0,
            finished: false,
        }
    }

    /// The pattern being scanned.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the store has signalled the end of the iteration.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next page, or `None` when the iteration is complete.
    pub async fn next_page(&mut self) -> CacheResult<Option<Vec<String>>> {
        if self.finished {
            return Ok(None);
        }

        let (next, keys) = self.store.scan(self.cursor, &self.pattern, self.count).await?;
        trace!(pattern = %self.pattern, cursor = self.cursor, next, found = keys.len(), "Scanned page");

        self.cursor = next;
        self.finished = next == 0;
        Ok(Some(keys))
    }

    /// Drain every page, keeping the first occurrence of each key.
    pub async fn collect_keys(mut self) -> CacheResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        while let Some(page) = self.next_page().await? {
            keys.extend(page.into_iter().filter(|key| seen.insert(key.clone())));
        }
        Ok(keys)
    }

    /// Stream the pages.
    pub fn into_stream(self) -> impl Stream<Item = CacheResult<Vec<String>>> + 'a {
        stream::try_unfold(self, |mut scanner| async move {
            Ok(scanner.next_page().await?.map(|page| (page, scanner)))
        })
    }
}
