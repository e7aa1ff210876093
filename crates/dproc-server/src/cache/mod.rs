//! Staging cache
//!
//! Two logical maps hand payloads between pipeline stages without sending
//! them over the bus: `file-content` holds the JSON text of an ingested file
//! under the producer's handoff key, `valid-records` holds the serialized
//! valid records of one validation run under a fresh key.

mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryCache;

/// Logical map inside the staging cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheMap {
    FileContent,
    ValidRecords,
}

impl CacheMap {
    pub fn name(self) -> &'static str {
        match self {
            CacheMap::FileContent => "file-content",
            CacheMap::ValidRecords => "valid-records",
        }
    }

    /// Fresh key of the form `<map>:<uuid>`.
    pub fn new_key(self) -> String {
        format!("{}:{}", self.name(), Uuid::new_v4())
    }
}

impl std::fmt::Display for CacheMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("staging cache unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode staged records: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait StagingCache: Send + Sync {
    async fn get(&self, map: CacheMap, key: &str) -> Result<Option<String>, CacheError>;

    /// `ttl` of `None` keeps the entry until it is removed.
    async fn set(
        &self,
        map: CacheMap,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    async fn remove(&self, map: CacheMap, key: &str) -> Result<bool, CacheError>;
}

pub type SharedCache = Arc<dyn StagingCache>;

/// Serialize `records` into the `valid-records` map under a fresh key.
pub async fn stage_records(
    cache: &dyn StagingCache,
    records: &[Value],
    ttl: Duration,
) -> Result<String, CacheError> {
    let key = CacheMap::ValidRecords.new_key();
    let payload = serde_json::to_string(records)?;
    cache
        .set(CacheMap::ValidRecords, &key, payload, Some(ttl))
        .await?;
    Ok(key)
}

/// Load a batch previously written by [`stage_records`].
pub async fn load_records(
    cache: &dyn StagingCache,
    key: &str,
) -> Result<Option<Vec<Value>>, CacheError> {
    match cache.get(CacheMap::ValidRecords, key).await? {
        Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
        None => Ok(None),
    }
}
