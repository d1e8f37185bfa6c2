//! Dataset cache (C4, spec §4.4).
//!
//! TTL-bound key/value persistence of a computed `Dataset`, backed by
//! Redis/Dragonfly (the teacher's client). Every operation degrades
//! gracefully: a backing-store failure logs a warning and returns a
//! null-result rather than propagating an error. A feature flag disables
//! the cache entirely.

use crate::model::Dataset;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

pub struct DatasetCache {
    conn: Option<redis::aio::ConnectionManager>,
    enabled: bool,
    op_timeout: Duration,
}

impl DatasetCache {
    pub async fn connect(redis_url: &str, enabled: bool, op_timeout_secs: u64) -> Self {
        if !enabled {
            return DatasetCache { conn: None, enabled: false, op_timeout: Duration::from_secs(op_timeout_secs) };
        }

        match redis::Client::open(redis_url) {
            Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                Ok(conn) => DatasetCache { conn: Some(conn), enabled: true, op_timeout: Duration::from_secs(op_timeout_secs) },
                Err(e) => {
                    warn!(reason = "redis_connect_failed", error = %e, "dataset cache unavailable, degrading to no-op");
                    DatasetCache { conn: None, enabled: true, op_timeout: Duration::from_secs(op_timeout_secs) }
                }
            },
            Err(e) => {
                warn!(reason = "redis_client_invalid", error = %e, "dataset cache unavailable, degrading to no-op");
                DatasetCache { conn: None, enabled: true, op_timeout: Duration::from_secs(op_timeout_secs) }
            }
        }
    }

    /// A cache that is always a no-op, for tests and for `CACHE_ENABLED=false`.
    pub fn disabled() -> Self {
        DatasetCache { conn: None, enabled: false, op_timeout: Duration::from_secs(5) }
    }

    pub async fn get(&self, key: &str) -> Option<Dataset> {
        if !self.enabled {
            return None;
        }
        let Some(conn) = self.conn.clone() else { return None };

        let result = tokio::time::timeout(self.op_timeout, fetch(conn, key.to_string())).await;
        match result {
            Ok(Ok(Some(dataset))) => Some(dataset),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!(reason = "cache_get_failed", key, error = %e, "dataset cache get failed, treating as miss");
                None
            }
            Err(_) => {
                warn!(reason = "cache_get_timeout", key, "dataset cache get timed out, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, dataset: &Dataset, ttl_seconds: u64) {
        if !self.enabled {
            return;
        }
        let Some(conn) = self.conn.clone() else { return };

        let Ok(serialized) = serde_json::to_string(dataset) else {
            warn!(reason = "cache_serialize_failed", key, "failed to serialize dataset for cache, skipping set");
            return;
        };

        let result = tokio::time::timeout(self.op_timeout, store(conn, key.to_string(), serialized, ttl_seconds)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(reason = "cache_set_failed", key, error = %e, "dataset cache set failed"),
            Err(_) => warn!(reason = "cache_set_timeout", key, "dataset cache set timed out"),
        }
    }

    pub async fn invalidate(&self, key: &str) {
        if !self.enabled {
            return;
        }
        let Some(mut conn) = self.conn.clone() else { return };
        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!(reason = "cache_invalidate_failed", key, error = %e, "dataset cache invalidate failed");
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(mut conn) = self.conn.clone() else { return false };
        conn.exists::<_, bool>(key).await.unwrap_or(false)
    }
}

async fn fetch(mut conn: redis::aio::ConnectionManager, key: String) -> redis::RedisResult<Option<Dataset>> {
    let raw: Option<String> = conn.get(&key).await?;
    Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
}

async fn store(mut conn: redis::aio::ConnectionManager, key: String, value: String, ttl_seconds: u64) -> redis::RedisResult<()> {
    conn.set_ex(&key, value, ttl_seconds).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_is_always_a_miss() {
        let cache = DatasetCache::disabled();
        assert!(cache.get("any-key").await.is_none());
        assert!(!cache.exists("any-key").await);
    }
}
