//! Native Redis transport over a `deadpool-redis` pool.
//!
//! For deployments that run a plain Redis instead of the REST service.
//! The pool is created lazily; no connection is opened until the first
//! command.

use super::{CacheStore, SetOptions};
use crate::{CacheError, CacheResult};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use readmaster_config::CacheConfig;
use tracing::debug;

/// Redis-backed cache store.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from cache configuration.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        let url = config.redis_endpoint().ok_or_else(|| {
            CacheError::Configuration("Redis URL is required for the redis backend".to_string())
        })?;

        let pool = Config::from_url(url)
            .builder()
            .map_err(|e| CacheError::Configuration(format!("Invalid Redis config: {}", e)))?
            .max_size(config.pool_size as usize)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| CacheError::Configuration(format!("Failed to create pool: {}", e)))?;

        debug!(pool_size = config.pool_size, "Created Redis pool");
        Ok(Self { pool })
    }

    /// Get a connection from the pool.
    async fn conn(&self) -> CacheResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("GET").arg(key).query_async(&mut *conn).await?)
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> CacheResult<bool> {
        let mut conn = self.conn().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(secs) = options.expiry.seconds() {
            cmd.arg("EX").arg(secs);
        }
        if let Some(flag) = options.condition.flag() {
            cmd.arg(flag);
        }

        let reply: Option<String> = cmd.query_async(&mut *conn).await?;
        Ok(reply.is_some())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(redis::cmd("DEL").arg(keys).query_async(&mut *conn).await?)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("EXISTS").arg(key).query_async(&mut *conn).await?)
    }

    async fn expire(&self, key: &str, seconds: u64) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut *conn)
            .await?)
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("TTL").arg(key).query_async(&mut *conn).await?)
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        Ok(redis::cmd("MGET").arg(keys).query_async(&mut *conn).await?)
    }

    async fn mset(&self, entries: &[(String, String)]) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("MSET");
        for (key, value) in entries {
            cmd.arg(key).arg(value);
        }
        cmd.query_async::<()>(&mut *conn).await?;
        Ok(())
    }

    async fn expire_many(&self, keys: &[String], seconds: u64) -> CacheResult<Vec<bool>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("EXPIRE").arg(key).arg(seconds);
        }
        Ok(pipe.query_async(&mut *conn).await?)
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("INCR").arg(key).query_async(&mut *conn).await?)
    }

    async fn incr_by(&self, key: &str, amount: i64) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("INCRBY")
            .arg(key)
            .arg(amount)
            .query_async(&mut *conn)
            .await?)
    }

    async fn decr(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("DECR").arg(key).query_async(&mut *conn).await?)
    }

    async fn decr_by(&self, key: &str, amount: i64) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("DECRBY")
            .arg(key)
            .arg(amount)
            .query_async(&mut *conn)
            .await?)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: u32) -> CacheResult<(u64, Vec<String>)> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut *conn)
            .await?)
    }

    async fn ping(&self) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let reply: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(reply == "PONG")
    }
}
