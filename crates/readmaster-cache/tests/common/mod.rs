//! Common test infrastructure for cache integration tests.

#![allow(dead_code)]

use readmaster_cache::{CacheClient, CacheService, MemoryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A cache service backed by an in-process store.
///
/// Keeps a handle on the store so tests can inspect it directly.
pub struct TestCache {
    pub service: CacheService,
    pub store: Arc<MemoryStore>,
}

impl TestCache {
    /// Creates a service over a fresh, empty store.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let service = CacheService::with_store(store.clone()).with_scan_count(2);
        Self { service, store }
    }
}

/// A service whose client can never be initialized.
pub fn degraded_cache() -> CacheService {
    CacheService::new(Arc::new(CacheClient::unavailable()))
}

/// Counts how many times it has been called.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
