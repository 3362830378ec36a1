//! Configuration validation module.
//!
//! Collects every problem in one pass so that a misconfigured deployment
//! reports all of them at once. Absent store credentials are deliberately
//! not validated here: the cache degrades instead of refusing to start.

use crate::{AppConfig, CacheConfig, ObservabilityConfig};
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Timeout value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// SCAN count hint must be positive and bounded.
    InvalidScanCount { value: u32, maximum: u32 },
    /// Pool size must be positive and bounded.
    InvalidPoolSize { value: u32, maximum: u32 },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Log format is invalid.
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "Timeout '{}' must be positive, got {}", name, value)
            }
            Self::InvalidScanCount { value, maximum } => {
                write!(f, "Invalid scan count: {} (must be between 1 and {})", value, maximum)
            }
            Self::InvalidPoolSize { value, maximum } => {
                write!(f, "Invalid pool size: {} (must be between 1 and {})", value, maximum)
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
            Self::InvalidLogFormat { value } => {
                write!(f, "Invalid log format: '{}' (valid: pretty, json)", value)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of configuration validation containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ConfigValidationError>,
}

impl ValidationResult {
    fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the validation errors.
    pub fn errors(&self) -> &[ConfigValidationError] {
        &self.errors
    }

    /// Converts to Result, returning Err with all errors if any exist.
    pub fn into_result(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Upper bound for the SCAN `COUNT` hint.
    const MAX_SCAN_COUNT: u32 = 10_000;
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: u32 = 1000;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];
    /// Valid log formats.
    const VALID_LOG_FORMATS: &'static [&'static str] = &["pretty", "json"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut result = ValidationResult::default();

        Self::validate_cache(&config.cache, &mut result);
        Self::validate_observability(&config.observability, &mut result);

        result.into_result()
    }

    fn validate_cache(config: &CacheConfig, result: &mut ValidationResult) {
        if let Some(url) = config.rest_url.as_deref().filter(|u| !u.trim().is_empty()) {
            match Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => result.add_error(ConfigValidationError::InvalidUrl {
                    url_type: "rest".to_string(),
                    message: format!("unsupported scheme '{}'", parsed.scheme()),
                }),
                Err(e) => result.add_error(ConfigValidationError::InvalidUrl {
                    url_type: "rest".to_string(),
                    message: e.to_string(),
                }),
            }
        }

        if let Some(url) = config.redis_endpoint() {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                result.add_error(ConfigValidationError::InvalidUrl {
                    url_type: "redis".to_string(),
                    message: "URL must start with redis:// or rediss://".to_string(),
                });
            }
        }

        if config.request_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "cache.request_timeout_secs".to_string(),
                value: 0,
            });
        }

        if config.scan_count == 0 || config.scan_count > Self::MAX_SCAN_COUNT {
            result.add_error(ConfigValidationError::InvalidScanCount {
                value: config.scan_count,
                maximum: Self::MAX_SCAN_COUNT,
            });
        }

        if config.pool_size == 0 || config.pool_size > Self::MAX_POOL_SIZE {
            result.add_error(ConfigValidationError::InvalidPoolSize {
                value: config.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }
    }

    fn validate_observability(config: &ObservabilityConfig, result: &mut ValidationResult) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }

        let format = config.log_format.to_lowercase();
        if !Self::VALID_LOG_FORMATS.contains(&format.as_str()) {
            result.add_error(ConfigValidationError::InvalidLogFormat {
                value: config.log_format.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config_passes() {
        let config = AppConfig::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_missing_credentials_are_not_errors() {
        let mut config = AppConfig::default();
        config.cache.rest_url = None;
        config.cache.rest_token = None;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_rest_url() {
        let mut config = AppConfig::default();
        config.cache.rest_url = Some("not a url".to_string());

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidUrl { url_type, .. } if url_type == "rest")));
    }

    #[test]
    fn test_rest_url_requires_http_scheme() {
        let mut config = AppConfig::default();
        config.cache.rest_url = Some("redis://kv.example.com".to_string());

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_invalid_redis_url() {
        let mut config = AppConfig::default();
        config.cache.redis_url = Some("http://localhost:6379".to_string());

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidUrl { url_type, .. } if url_type == "redis")));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.cache.request_timeout_secs = 0;
        config.cache.scan_count = 0;
        config.cache.pool_size = 5000;
        config.observability.log_level = "verbose".to_string();
        config.observability.log_format = "xml".to_string();

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_error_display() {
        let err = ConfigValidationError::InvalidScanCount {
            value: 0,
            maximum: 10_000,
        };
        assert_eq!(err.to_string(), "Invalid scan count: 0 (must be between 1 and 10000)");
    }
}
