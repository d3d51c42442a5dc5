//! Ephemeral progress store.
//!
//! Export records and one-time download handoffs live in a TTL key-value
//! store. Redis is used in production; [`MemoryStore`] backs single-process
//! deployments and tests.

pub mod error;
pub mod memory;
pub mod redis_store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// TTL key-value store for short-lived JSON records.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Atomically read and delete. At most one caller ever sees the value.
    async fn take(&self, key: &str) -> StoreResult<Option<String>>;

    /// Backend liveness check.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Serialize `value` as JSON and store it.
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn ProgressStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> StoreResult<()> {
    let payload = serde_json::to_string(value)?;
    store.set(key, &payload, ttl).await
}

/// Fetch and deserialize a JSON record.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn ProgressStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
        None => Ok(None),
    }
}

/// Atomically take and deserialize a JSON record.
pub async fn take_json<T: DeserializeOwned>(
    store: &dyn ProgressStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.take(key).await? {
        Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
        None => Ok(None),
    }
}
