//! Transport-level cache errors.
//!
//! These never cross the public `CacheService` API; they are produced by
//! `CacheStore` implementations and converted into log lines and safe
//! defaults one layer up.

use readmaster_core::ReadMasterError;
use thiserror::Error;

/// Result type for store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by a cache store transport.
#[derive(Debug, Error)]
pub enum CacheError {
    /// HTTP transport failure talking to the REST store.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Redis protocol or I/O error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis pool error.
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Value could not be encoded or decoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store accepted the request but answered with an error.
    #[error("Store returned an error: {0}")]
    Remote(String),

    /// The store answered with a payload of the wrong shape.
    #[error("Unexpected response to {command}: {detail}")]
    UnexpectedResponse { command: String, detail: String },

    /// The client could not be constructed from configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    pub(crate) fn unexpected(command: impl Into<String>, detail: impl ToString) -> Self {
        Self::UnexpectedResponse {
            command: command.into(),
            detail: detail.to_string(),
        }
    }
}

impl From<CacheError> for ReadMasterError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Configuration(message) => Self::Configuration(message),
            other => Self::Cache(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_readmaster_error() {
        let err: ReadMasterError = CacheError::Remote("WRONGTYPE".to_string()).into();
        assert!(matches!(err, ReadMasterError::Cache(ref m) if m.contains("WRONGTYPE")));
        assert!(err.is_retriable());

        let err: ReadMasterError = CacheError::Configuration("missing token".to_string()).into();
        assert!(matches!(err, ReadMasterError::Configuration(_)));
    }

    #[test]
    fn test_unexpected_response_display() {
        let err = CacheError::unexpected("SCAN", "expected array");
        assert_eq!(err.to_string(), "Unexpected response to SCAN: expected array");
    }
}
