//! In-process staging cache with lazy and periodic expiry

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CacheError, CacheMap, StagingCache};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: Instant,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<(CacheMap, String), CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry and return how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Purge expired entries every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = self.purge_expired().await;
                        if purged > 0 {
                            debug!(purged, "Purged expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl StagingCache for InMemoryCache {
    async fn get(&self, map: CacheMap, key: &str) -> Result<Option<String>, CacheError> {
        let id = (map, key.to_string());
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(&id) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict under the write lock, rechecking in case it was replaced.
        let mut entries = self.entries.write().await;
        if entries.get(&id).is_some_and(|e| e.is_expired(now)) {
            if let Some(entry) = entries.remove(&id) {
                debug!(
                    map = %map,
                    key,
                    age_secs = now.duration_since(entry.created_at).as_secs(),
                    "Evicted expired cache entry"
                );
            }
        }
        Ok(None)
    }

    async fn set(
        &self,
        map: CacheMap,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        };
        self.entries
            .write()
            .await
            .insert((map, key.to_string()), entry);
        Ok(())
    }

    async fn remove(&self, map: CacheMap, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .entries
            .write()
            .await
            .remove(&(map, key.to_string()))
            .is_some())
    }
}
