//! Application configuration structures.

use readmaster_core::{LogFormat, TelemetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the REST endpoint of the key-value store.
pub const REST_URL_ENV: &str = "UPSTASH_REDIS_REST_URL";

/// Environment variable holding the REST access token.
pub const REST_TOKEN_ENV: &str = "UPSTASH_REDIS_REST_TOKEN";

/// Environment variable holding a native Redis URL.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Cache store configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "readmaster".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Which transport the cache talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// REST request/response key-value service.
    #[default]
    Upstash,
    /// Plain Redis over a pooled TCP connection.
    Redis,
}

/// Cache store configuration.
///
/// Missing credentials are not an error: the cache layer degrades to
/// "always miss" instead of failing startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch. When false the client is never constructed.
    pub enabled: bool,
    /// Transport selection.
    pub backend: CacheBackend,
    /// REST endpoint URL.
    pub rest_url: Option<String>,
    /// REST access token.
    pub rest_token: Option<String>,
    /// Redis URL, used when `backend = "redis"`.
    pub redis_url: Option<String>,
    /// Connection pool size for the Redis backend.
    pub pool_size: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// `COUNT` hint passed to every `SCAN` page.
    pub scan_count: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Upstash,
            rest_url: None,
            rest_token: None,
            redis_url: None,
            pool_size: 8,
            request_timeout_secs: 10,
            scan_count: 100,
        }
    }
}

impl CacheConfig {
    /// Builds a configuration from the conventional store environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_fallbacks();
        config
    }

    /// Creates a REST configuration with explicit credentials.
    #[must_use]
    pub fn upstash(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            rest_url: Some(url.into()),
            rest_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Creates a native Redis configuration.
    #[must_use]
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Fills unset connection values from the process environment.
    pub fn apply_env_fallbacks(&mut self) {
        self.apply_fallbacks_from(|name| std::env::var(name).ok());
    }

    /// Fills unset connection values from an arbitrary lookup.
    pub fn apply_fallbacks_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if blank(self.rest_url.as_deref()) {
            self.rest_url = non_empty(REST_URL_ENV);
        }
        if blank(self.rest_token.as_deref()) {
            self.rest_token = non_empty(REST_TOKEN_ENV);
        }
        if blank(self.redis_url.as_deref()) {
            self.redis_url = non_empty(REDIS_URL_ENV);
        }
    }

    /// Returns the REST endpoint and token when both are present and non-empty.
    #[must_use]
    pub fn rest_credentials(&self) -> Option<(&str, &str)> {
        let url = self.rest_url.as_deref().filter(|v| !v.trim().is_empty())?;
        let token = self.rest_token.as_deref().filter(|v| !v.trim().is_empty())?;
        Some((url, token))
    }

    /// Returns the Redis URL when present and non-empty.
    #[must_use]
    pub fn redis_endpoint(&self) -> Option<&str> {
        self.redis_url.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Returns the request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: String,
    /// Enable metrics.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ObservabilityConfig {
    /// Converts into the tracing setup understood by `readmaster_core::init_tracing`.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryConfig {
        let format = if self.log_format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };

        TelemetryConfig {
            filter: format!("{},readmaster=debug", self.log_level.to_lowercase()),
            format,
            ..TelemetryConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_cache_config() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.backend, CacheBackend::Upstash);
        assert_eq!(config.scan_count, 100);
        assert!(config.rest_credentials().is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_fallbacks_fill_missing_values() {
        let mut config = CacheConfig::default();
        config.apply_fallbacks_from(lookup(&[
            (REST_URL_ENV, "https://kv.example.com"),
            (REST_TOKEN_ENV, "secret"),
        ]));

        assert_eq!(
            config.rest_credentials(),
            Some(("https://kv.example.com", "secret"))
        );
        assert!(config.redis_endpoint().is_none());
    }

    #[test]
    fn test_fallbacks_do_not_override_explicit_values() {
        let mut config = CacheConfig::upstash("https://explicit.example.com", "mine");
        config.apply_fallbacks_from(lookup(&[
            (REST_URL_ENV, "https://env.example.com"),
            (REST_TOKEN_ENV, "theirs"),
        ]));

        assert_eq!(
            config.rest_credentials(),
            Some(("https://explicit.example.com", "mine"))
        );
    }

    #[test]
    fn test_empty_values_count_as_absent() {
        let mut config = CacheConfig::default();
        config.apply_fallbacks_from(lookup(&[
            (REST_URL_ENV, "https://kv.example.com"),
            (REST_TOKEN_ENV, "   "),
        ]));

        assert!(config.rest_token.is_none());
        assert!(config.rest_credentials().is_none());
    }

    #[test]
    fn test_redis_constructor() {
        let config = CacheConfig::redis("redis://localhost:6379");
        assert_eq!(config.backend, CacheBackend::Redis);
        assert_eq!(config.redis_endpoint(), Some("redis://localhost:6379"));
    }

    #[test]
    fn test_observability_to_telemetry() {
        let config = ObservabilityConfig {
            log_level: "WARN".to_string(),
            log_format: "json".to_string(),
            metrics_enabled: false,
        };
        let telemetry = config.telemetry();
        assert_eq!(telemetry.format, LogFormat::Json);
        assert_eq!(telemetry.filter, "warn,readmaster=debug");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [cache]
            backend = "redis"
            redis_url = "redis://cache:6379"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.scan_count, 100);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.app.name, "readmaster");
    }
}
