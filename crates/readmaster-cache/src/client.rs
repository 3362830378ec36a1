//! Lazily-initialized handle to the remote cache store.

use crate::store::{CacheStore, RedisStore, UpstashStore};
use crate::CacheResult;
use parking_lot::RwLock;
use readmaster_config::{CacheBackend, CacheConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where the store handle comes from on (re)initialization.
enum Source {
    Config(CacheConfig),
    Store(Arc<dyn CacheStore>),
}

/// Outcome of the one-shot initialization.
#[derive(Clone)]
enum State {
    Ready(Arc<dyn CacheStore>),
    Unavailable,
}

/// Process-wide accessor for the cache store.
///
/// Constructed explicitly and held by the application context. The first
/// call to [`client`](Self::client) performs initialization exactly once and
/// logs exactly one line describing the outcome; every later call reuses it.
/// Missing configuration is not an error: the client simply reports itself
/// unavailable.
pub struct CacheClient {
    source: Source,
    state: RwLock<Option<State>>,
    attempts: AtomicU32,
}

impl CacheClient {
    /// Create an accessor that initializes from configuration on first use.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::from_source(Source::Config(config))
    }

    /// Create an accessor around an already-constructed store.
    #[must_use]
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self::from_source(Source::Store(store))
    }

    /// Create an accessor that is permanently unavailable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        })
    }

    fn from_source(source: Source) -> Self {
        Self {
            source,
            state: RwLock::new(None),
            attempts: AtomicU32::new(0),
        }
    }

    /// Returns the store handle, or `None` when the cache is unavailable.
    pub fn client(&self) -> Option<Arc<dyn CacheStore>> {
        if let Some(state) = self.state.read().as_ref() {
            return state.store();
        }

        let mut guard = self.state.write();
        if guard.is_none() {
            *guard = Some(self.initialize());
        }
        guard.as_ref().and_then(State::store)
    }

    /// Whether a store handle is available.
    pub fn is_available(&self) -> bool {
        self.client().is_some()
    }

    /// Forget the initialization outcome so the next call initializes again.
    #[cfg(any(test, feature = "test-support"))]
    pub fn reset(&self) {
        *self.state.write() = None;
    }

    fn initialize(&self) -> State {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let config = match &self.source {
            Source::Store(store) => {
                info!(store = store.name(), "Cache client initialized with injected store");
                return State::Ready(Arc::clone(store));
            }
            Source::Config(config) => config,
        };

        match connect(config) {
            Ok(Some(store)) => {
                info!(store = store.name(), "Cache client initialized");
                State::Ready(store)
            }
            Ok(None) => {
                warn!(
                    backend = ?config.backend,
                    enabled = config.enabled,
                    "Cache store not configured; caching is disabled"
                );
                State::Unavailable
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize cache client; caching is disabled");
                State::Unavailable
            }
        }
    }
}

impl State {
    fn store(&self) -> Option<Arc<dyn CacheStore>> {
        match self {
            Self::Ready(store) => Some(Arc::clone(store)),
            Self::Unavailable => None,
        }
    }
}

/// Build a store from configuration.
///
/// Returns `Ok(None)` when caching is disabled or the backend's connection
/// settings are absent.
pub(crate) fn connect(config: &CacheConfig) -> CacheResult<Option<Arc<dyn CacheStore>>> {
    if !config.enabled {
        return Ok(None);
    }

    match config.backend {
        CacheBackend::Upstash => {
            if config.rest_credentials().is_none() {
                return Ok(None);
            }
            Ok(Some(Arc::new(UpstashStore::from_config(config)?)))
        }
        CacheBackend::Redis => {
            if config.redis_endpoint().is_none() {
                return Ok(None);
            }
            Ok(Some(Arc::new(RedisStore::from_config(config)?)))
        }
    }
}
