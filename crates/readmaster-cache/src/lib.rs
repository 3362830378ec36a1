//! # Read Master Cache
//!
//! Cache-aside service layer in front of the primary data store.
//!
//! The cache is strictly an optimization: every public operation on
//! [`CacheService`] swallows transport failures, logs them, and returns a
//! safe default, so a fully unavailable store degrades consumers to
//! "always miss" rather than to errors.
//!
//! ```ignore
//! metrics::init_metrics(&app_config.observability);
//! let cache = CacheService::from_config(app_config.cache.clone());
//! let key = keys::book_key(&book_id, &[&"progress"]);
//! let progress = cache
//!     .get_or_set(&key, CacheTtl::Medium, || repo.load_progress(&book_id))
//!     .await?;
//! ```

mod background;
mod client;
mod error;
mod invalidation;
pub mod keys;
pub mod metrics;
mod scan;
mod service;
pub mod store;
mod ttl;
mod wrappers;

pub use client::CacheClient;
pub use error::{CacheError, CacheResult};
pub use scan::KeyScanner;
pub use service::{CacheService, GetOptions};
pub use store::{CacheStore, MemoryStore, RedisStore, SetCondition, SetOptions, TtlStatus, UpstashStore};
pub use ttl::{CacheTtl, Expiry};
pub use wrappers::{with_cache, with_invalidation, CachedFn, InvalidatingFn, InvalidationKeys};
