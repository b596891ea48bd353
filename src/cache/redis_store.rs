use super::{CacheError, CacheStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::time::Duration;
use tracing::{Instrument, info_span};

/// Redis-backed cache sharing one multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis at `url` (`redis://` or `rediss://`).
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the first connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid Redis URL")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { manager })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

// Redis rejects a zero expiry.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn span(operation: &'static str, key: &str) -> tracing::Span {
    info_span!(
        "cache.command",
        db.system = "redis",
        db.operation = operation,
        cache.key = key
    )
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection();
        let _: () = conn
            .set_ex(key, value, ttl_seconds(ttl))
            .instrument(span("SETEX", key))
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let mut conn = self.connection();
        let value: Option<String> = conn.get(key).instrument(span("GET", key)).await?;
        value.ok_or(CacheError::Miss)
    }

    async fn take(&self, key: &str) -> Result<String, CacheError> {
        let mut conn = self.connection();
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .instrument(span("GETDEL", key))
            .await?;
        value.ok_or(CacheError::Miss)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection();
        let _: () = conn.del(key).instrument(span("DEL", key)).await?;
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection();
        let _: () = redis::pipe()
            .atomic()
            .sadd(key, member)
            .ignore()
            .expire(key, i64::try_from(ttl_seconds(ttl)).unwrap_or(i64::MAX))
            .ignore()
            .query_async(&mut conn)
            .instrument(span("SADD", key))
            .await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection();
        let members: Vec<String> = conn.smembers(key).instrument(span("SMEMBERS", key)).await?;
        // Redis drops empty sets, so an empty reply means the key is gone.
        if members.is_empty() {
            return Err(CacheError::Miss);
        }
        Ok(members)
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.connection();
        let _: () = conn.srem(key, member).instrument(span("SREM", key)).await?;
        Ok(())
    }

    async fn set_with_index(
        &self,
        key: &str,
        value: &str,
        index_key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let seconds = ttl_seconds(ttl);
        let mut conn = self.connection();
        let _: () = redis::pipe()
            .atomic()
            .set_ex(key, value, seconds)
            .ignore()
            .sadd(index_key, member)
            .ignore()
            .expire(index_key, i64::try_from(seconds).unwrap_or(i64::MAX))
            .ignore()
            .query_async(&mut conn)
            .instrument(span("MULTI", key))
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .instrument(span("PING", ""))
            .await?;
        Ok(())
    }
}
