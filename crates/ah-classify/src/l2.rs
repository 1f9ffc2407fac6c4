//! L2: distributed read-through cache, backed by Redis in production and an
//! in-process fake for `ah-dev`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use ah_common::Classification;

use crate::error::{ClassifyError, Result};

#[async_trait]
pub trait L2Cache: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Result<Option<Classification>>;
    async fn put(&self, classification: &Classification, ttl: Duration) -> Result<()>;
}

/// Redis-backed L2, mirroring the teacher's `ConnectionManager` usage for
/// automatic reconnect without an explicit health loop.
pub struct RedisL2Cache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisL2Cache {
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| ClassifyError::L2Cache(e.to_string()))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| ClassifyError::L2Cache(e.to_string()))?;
        Ok(Self { conn, key_prefix: key_prefix.into() })
    }

    fn key(&self, fingerprint: &str) -> String {
        format!("{}:{}", self.key_prefix, fingerprint)
    }
}

#[async_trait]
impl L2Cache for RedisL2Cache {
    async fn get(&self, fingerprint: &str) -> Result<Option<Classification>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> =
            conn.get(self.key(fingerprint)).await.map_err(|e| ClassifyError::L2Cache(e.to_string()))?;

        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| ClassifyError::L2Cache(e.to_string())),
            None => Ok(None),
        }
    }

    async fn put(&self, classification: &Classification, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(classification).map_err(|e| ClassifyError::L2Cache(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.key(&classification.fingerprint), json, ttl.as_secs())
            .await
            .map_err(|e| ClassifyError::L2Cache(e.to_string()))?;
        Ok(())
    }
}

/// In-memory stand-in for local dev iteration — no TTL eviction, since
/// dev sessions are short-lived; swapped in by `bin/ah-dev`.
#[derive(Default)]
pub struct InMemoryL2Cache {
    entries: Mutex<HashMap<String, Classification>>,
}

impl InMemoryL2Cache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl L2Cache for InMemoryL2Cache {
    async fn get(&self, fingerprint: &str) -> Result<Option<Classification>> {
        Ok(self.entries.lock().get(fingerprint).cloned())
    }

    async fn put(&self, classification: &Classification, _ttl: Duration) -> Result<()> {
        self.entries.lock().insert(classification.fingerprint.clone(), classification.clone());
        Ok(())
    }
}

/// Wraps any `L2Cache` so a connection failure degrades to a cache miss
/// instead of failing classification — per §4.E, L2 errors must not fail
/// the enclosing ingest.
pub struct FaultTolerantL2 {
    inner: Arc<dyn L2Cache>,
}

impl FaultTolerantL2 {
    pub fn new(inner: Arc<dyn L2Cache>) -> Self {
        Self { inner }
    }

    pub async fn get(&self, fingerprint: &str) -> Option<Classification> {
        match self.inner.get(fingerprint).await {
            Ok(found) => found,
            Err(err) => {
                warn!(%err, "L2 cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn put(&self, classification: &Classification, ttl: Duration) {
        if let Err(err) = self.inner.put(classification, ttl).await {
            warn!(%err, "L2 cache write failed, continuing without it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_common::{ClassificationSource, Severity};
    use chrono::Utc;

    fn sample(fingerprint: &str) -> Classification {
        Classification {
            fingerprint: fingerprint.to_string(),
            severity: Severity::Info,
            confidence: 0.2,
            reasoning: "no rule matched".to_string(),
            recommendations: vec![],
            processing_time_seconds: 0.0,
            source: ClassificationSource::Fallback,
            model: None,
            model_version: None,
            cache_hit: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_cache_round_trips() {
        let cache = InMemoryL2Cache::new();
        assert!(cache.get("fp").await.unwrap().is_none());
        cache.put(&sample("fp"), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("fp").await.unwrap().unwrap().fingerprint, "fp");
    }

    struct FailingCache;

    #[async_trait]
    impl L2Cache for FailingCache {
        async fn get(&self, _fingerprint: &str) -> Result<Option<Classification>> {
            Err(ClassifyError::L2Cache("connection refused".to_string()))
        }
        async fn put(&self, _classification: &Classification, _ttl: Duration) -> Result<()> {
            Err(ClassifyError::L2Cache("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn fault_tolerant_wrapper_degrades_to_miss_on_error() {
        let wrapper = FaultTolerantL2::new(Arc::new(FailingCache));
        assert!(wrapper.get("fp").await.is_none());
        wrapper.put(&sample("fp"), Duration::from_secs(60)).await;
    }
}
