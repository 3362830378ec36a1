//! REST transport for an Upstash-compatible key-value service.
//!
//! Every command is a JSON array of strings POSTed to the endpoint with a
//! bearer token; the reply is `{"result": ...}` or `{"error": "..."}`.
//! Pipelines POST an array of commands to `<endpoint>/pipeline` and get one
//! reply object per command. There is no connection state to manage.

use super::{CacheStore, SetOptions};
use crate::{CacheError, CacheResult};
use async_trait::async_trait;
use readmaster_config::CacheConfig;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Longest response body quoted in an error message.
const MAX_QUOTED_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl Reply {
    fn into_result(self) -> CacheResult<Value> {
        match self.error {
            Some(error) => Err(CacheError::Remote(error)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| (*part).to_string()).collect()
}

fn quote(body: &str) -> &str {
    match body.char_indices().nth(MAX_QUOTED_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn optional_string(name: &str, value: Value) -> CacheResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(CacheError::unexpected(name, format!("expected string or null, got {}", other))),
    }
}

fn integer(name: &str, value: &Value) -> CacheResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| CacheError::unexpected(name, format!("non-integer number {}", n))),
        Value::String(s) => s
            .parse()
            .map_err(|_| CacheError::unexpected(name, format!("non-integer string {:?}", s))),
        other => Err(CacheError::unexpected(name, format!("expected integer, got {}", other))),
    }
}

/// REST key-value store client.
///
/// Cheap to clone; the underlying HTTP client is shared.
#[derive(Clone)]
pub struct UpstashStore {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl UpstashStore {
    /// Create a client for the given endpoint and token.
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> CacheResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            endpoint,
            token: token.into(),
        })
    }

    /// Create a client from cache configuration.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        let (url, token) = config.rest_credentials().ok_or_else(|| {
            CacheError::Configuration("REST URL and token are both required".to_string())
        })?;
        Self::new(url, token, config.request_timeout())
    }

    /// The endpoint commands are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, url: &str, body: &Value, name: &str) -> CacheResult<Value> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|_| {
            CacheError::unexpected(name, format!("HTTP {}: {}", status, quote(&text)))
        })
    }

    /// Execute a single command.
    async fn execute(&self, args: Vec<String>) -> CacheResult<Value> {
        let name = args.first().cloned().unwrap_or_default();
        let body = Value::from(args);
        let raw = self.post(&self.endpoint, &body, &name).await?;

        let reply: Reply = serde_json::from_value(raw)
            .map_err(|e| CacheError::unexpected(name.as_str(), e))?;
        debug!(command = %name, "Executed REST command");
        reply.into_result()
    }

    /// Execute several commands in one round trip.
    async fn pipeline(&self, commands: Vec<Vec<String>>) -> CacheResult<Vec<CacheResult<Value>>> {
        let url = format!("{}/pipeline", self.endpoint);
        let count = commands.len();
        let body = Value::from(commands);

        match self.post(&url, &body, "PIPELINE").await? {
            Value::Array(items) => {
                if items.len() != count {
                    return Err(CacheError::unexpected(
                        "PIPELINE",
                        format!("expected {} replies, got {}", count, items.len()),
                    ));
                }
                items
                    .into_iter()
                    .map(|item| {
                        serde_json::from_value::<Reply>(item)
                            .map(Reply::into_result)
                            .map_err(|e| CacheError::unexpected("PIPELINE", e))
                    })
                    .collect()
            }
            other => {
                let reply: Reply = serde_json::from_value(other)
                    .map_err(|e| CacheError::unexpected("PIPELINE", e))?;
                match reply.into_result() {
                    Err(e) => Err(e),
                    Ok(value) => Err(CacheError::unexpected(
                        "PIPELINE",
                        format!("expected array, got {}", value),
                    )),
                }
            }
        }
    }

    async fn integer_command(&self, args: Vec<String>) -> CacheResult<i64> {
        let name = args.first().cloned().unwrap_or_default();
        let value = self.execute(args).await?;
        integer(&name, &value)
    }
}

#[async_trait]
impl CacheStore for UpstashStore {
    fn name(&self) -> &'static str {
        "upstash"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self.execute(command(&["GET", key])).await?;
        optional_string("GET", value)
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> CacheResult<bool> {
        let mut args = command(&["SET", key, value]);
        if let Some(secs) = options.expiry.seconds() {
            args.push("EX".to_string());
            args.push(secs.to_string());
        }
        if let Some(flag) = options.condition.flag() {
            args.push(flag.to_string());
        }

        match self.execute(args).await? {
            Value::Null => Ok(false),
            Value::String(s) if s == "OK" => Ok(true),
            other => Err(CacheError::unexpected("SET", format!("expected OK or null, got {}", other))),
        }
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut args = command(&["DEL"]);
        args.extend(keys.iter().cloned());

        let deleted = self.integer_command(args).await?;
        Ok(deleted.max(0).unsigned_abs())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.integer_command(command(&["EXISTS", key])).await? > 0)
    }

    async fn expire(&self, key: &str, seconds: u64) -> CacheResult<bool> {
        let secs = seconds.to_string();
        Ok(self.integer_command(command(&["EXPIRE", key, secs.as_str()])).await? == 1)
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.integer_command(command(&["TTL", key])).await
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = command(&["MGET"]);
        args.extend(keys.iter().cloned());

        match self.execute(args).await? {
            Value::Array(items) if items.len() == keys.len() => items
                .into_iter()
                .map(|item| optional_string("MGET", item))
                .collect(),
            other => Err(CacheError::unexpected(
                "MGET",
                format!("expected array of {} values, got {}", keys.len(), other),
            )),
        }
    }

    async fn mset(&self, entries: &[(String, String)]) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut args = command(&["MSET"]);
        for (key, value) in entries {
            args.push(key.clone());
            args.push(value.clone());
        }

        match self.execute(args).await? {
            Value::String(s) if s == "OK" => Ok(()),
            other => Err(CacheError::unexpected("MSET", format!("expected OK, got {}", other))),
        }
    }

    async fn expire_many(&self, keys: &[String], seconds: u64) -> CacheResult<Vec<bool>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let secs = seconds.to_string();
        let commands = keys
            .iter()
            .map(|key| command(&["EXPIRE", key.as_str(), secs.as_str()]))
            .collect();

        self.pipeline(commands)
            .await?
            .into_iter()
            .map(|reply| reply.and_then(|value| integer("EXPIRE", &value)).map(|n| n == 1))
            .collect()
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.integer_command(command(&["INCR", key])).await
    }

    async fn incr_by(&self, key: &str, amount: i64) -> CacheResult<i64> {
        let amount = amount.to_string();
        self.integer_command(command(&["INCRBY", key, amount.as_str()])).await
    }

    async fn decr(&self, key: &str) -> CacheResult<i64> {
        self.integer_command(command(&["DECR", key])).await
    }

    async fn decr_by(&self, key: &str, amount: i64) -> CacheResult<i64> {
        let amount = amount.to_string();
        self.integer_command(command(&["DECRBY", key, amount.as_str()])).await
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: u32) -> CacheResult<(u64, Vec<String>)> {
        let cursor = cursor.to_string();
        let count = count.to_string();
        let value = self
            .execute(command(&["SCAN", cursor.as_str(), "MATCH", pattern, "COUNT", count.as_str()]))
            .await?;

        let Value::Array(mut parts) = value else {
            return Err(CacheError::unexpected("SCAN", "expected [cursor, keys]"));
        };
        if parts.len() != 2 {
            return Err(CacheError::unexpected("SCAN", "expected [cursor, keys]"));
        }

        let keys = match parts.pop() {
            Some(Value::Array(keys)) => keys
                .into_iter()
                .map(|key| match key {
                    Value::String(s) => Ok(s),
                    other => Err(CacheError::unexpected("SCAN", format!("non-string key {}", other))),
                })
                .collect::<CacheResult<Vec<_>>>()?,
            _ => return Err(CacheError::unexpected("SCAN", "expected key array")),
        };
        let next = integer("SCAN", &parts[0])?;
        let next = u64::try_from(next).map_err(|_| CacheError::unexpected("SCAN", "negative cursor"))?;

        Ok((next, keys))
    }

    async fn ping(&self) -> CacheResult<bool> {
        let value = self.execute(command(&["PING"])).await?;
        Ok(matches!(value, Value::String(ref s) if s == "PONG"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_error_becomes_remote_error() {
        let reply: Reply = serde_json::from_value(json!({"error": "WRONGPASS invalid token"})).unwrap();
        assert!(matches!(reply.into_result(), Err(CacheError::Remote(ref m)) if m.starts_with("WRONGPASS")));
    }

    #[test]
    fn test_reply_null_result() {
        let reply: Reply = serde_json::from_value(json!({"result": null})).unwrap();
        assert_eq!(reply.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_integer_accepts_numbers_and_strings() {
        assert_eq!(integer("TTL", &json!(42)).unwrap(), 42);
        assert_eq!(integer("SCAN", &json!("17")).unwrap(), 17);
        assert!(integer("TTL", &json!("x")).is_err());
        assert!(integer("TTL", &json!([1])).is_err());
    }

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let store = UpstashStore::new("https://kv.example.com/", "t", Duration::from_secs(1)).unwrap();
        assert_eq!(store.endpoint(), "https://kv.example.com");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = CacheConfig::default();
        assert!(matches!(
            UpstashStore::from_config(&config),
            Err(CacheError::Configuration(_))
        ));
    }

    #[test]
    fn test_quote_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(quote(&body).len(), MAX_QUOTED_BODY);
        assert_eq!(quote("short"), "short");
    }
}
