//! Key/value cache with TTLs and string sets.
//!
//! Values are opaque strings (JSON for structured records). Two backends share
//! the [`CacheStore`] contract: [`RedisCache`] for deployments and
//! [`MemoryCache`] for local runs and tests.
//!
//! Key layout:
//!
//! | key | value |
//! |---|---|
//! | `session:{session_id}` | session record (JSON) |
//! | `user_sessions:{user_id}` | set of session ids |
//! | `magic-link:{code}` | user id |
//! | `user:{user_id}` | cached profile (JSON) |

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt::Display, time::Duration};
use thiserror::Error;

mod memory;
mod redis_store;

pub use memory::MemoryCache;
pub use redis_store::RedisCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Read a value, [`CacheError::Miss`] when absent or expired.
    async fn get(&self, key: &str) -> Result<String, CacheError>;

    /// Read and delete a value in one step. At most one caller gets the value.
    async fn take(&self, key: &str) -> Result<String, CacheError>;

    /// Delete a key of any kind. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Add `member` to the set at `key` and reset the set TTL.
    async fn add_to_set(&self, key: &str, member: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Members of the set at `key`, [`CacheError::Miss`] when the set does not exist.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError>;

    /// Remove `member`; a set left empty disappears.
    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), CacheError>;

    /// Store a value and index it in a set as a single atomic write.
    async fn set_with_index(
        &self,
        key: &str,
        value: &str,
        index_key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Liveness check used by `/health`.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Serialize `value` as JSON and store it.
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub async fn set_json<T>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError>
where
    T: Serialize + Sync,
{
    let payload = serde_json::to_string(value)?;
    cache.set(key, &payload, ttl).await
}

/// Load a JSON value.
///
/// # Errors
/// Returns [`CacheError::Miss`] when absent and [`CacheError::Serialization`] when the
/// stored payload does not decode into `T`.
pub async fn get_json<T>(cache: &dyn CacheStore, key: &str) -> Result<T, CacheError>
where
    T: DeserializeOwned,
{
    let payload = cache.get(key).await?;
    Ok(serde_json::from_str(&payload)?)
}

#[must_use]
pub fn session_key(session_id: impl Display) -> String {
    format!("session:{session_id}")
}

#[must_use]
pub fn user_sessions_key(user_id: impl Display) -> String {
    format!("user_sessions:{user_id}")
}

#[must_use]
pub fn magic_link_key(code: impl Display) -> String {
    format!("magic-link:{code}")
}

#[must_use]
pub fn user_key(user_id: impl Display) -> String {
    format!("user:{user_id}")
}
