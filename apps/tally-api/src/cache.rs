//! Query result cache.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /sales?...                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  key = sales:<actor>:<filters>:<page>                                  │
//! │       │                                                                 │
//! │       ├── hit  ──► cached JSON bytes (identical to the first response)  │
//! │       │                                                                 │
//! │       └── miss ──► compute ──► serialize ──► store with TTL ──► return  │
//! │                                                                         │
//! │  Backends: in-process map | Redis (SET … EX) | disabled (TTL 0)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cache is best-effort and never the source of truth: backend failures
//! are logged and the value is computed as if the key were missing. Writes do
//! not invalidate entries, so lists may be stale for up to one TTL.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "tally:";

/// Size cap of the in-process backend. Reaching it sweeps expired entries,
/// then evicts the oldest live ones down to three quarters of the cap.
const MAX_MEMORY_ENTRIES: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Shared, TTL-bounded cache of serialized responses.
#[derive(Clone)]
pub enum QueryCache {
    Disabled,
    Memory(MemoryCache),
    Redis(RedisCache),
}

impl QueryCache {
    /// In-process cache; a zero TTL disables caching.
    pub fn memory(ttl: Duration) -> Self {
        if ttl.is_zero() {
            QueryCache::Disabled
        } else {
            QueryCache::Memory(MemoryCache::new(ttl))
        }
    }

    /// Redis-backed cache; a zero TTL disables caching.
    pub async fn redis(url: &str, ttl: Duration) -> Result<Self, CacheError> {
        if ttl.is_zero() {
            return Ok(QueryCache::Disabled);
        }
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(QueryCache::Redis(RedisCache { conn, ttl }))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            QueryCache::Disabled => "disabled",
            QueryCache::Memory(_) => "memory",
            QueryCache::Redis(_) => "redis",
        }
    }

    /// Whether the backend answers. Local backends always do.
    pub async fn ping(&self) -> bool {
        match self {
            QueryCache::Disabled | QueryCache::Memory(_) => true,
            QueryCache::Redis(cache) => match cache.ping().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Redis ping failed");
                    false
                }
            },
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self {
            QueryCache::Disabled => None,
            QueryCache::Memory(cache) => cache.get(key).await,
            QueryCache::Redis(cache) => match cache.get(key).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache read failed, computing instead");
                    None
                }
            },
        }
    }

    pub async fn put(&self, key: &str, value: &str) {
        match self {
            QueryCache::Disabled => {}
            QueryCache::Memory(cache) => cache.put(key, value).await,
            QueryCache::Redis(cache) => {
                if let Err(e) = cache.put(key, value).await {
                    warn!(key = %key, error = %e, "Cache write failed");
                }
            }
        }
    }

    /// Returns the cached JSON for `key`, or computes, serializes and stores
    /// it.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &str, compute: F) -> Result<String, E>
    where
        T: Serialize,
        E: From<serde_json::Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key).await {
            debug!(key = %key, "Cache hit");
            return Ok(hit);
        }

        let value = compute().await?;
        let json = serde_json::to_string(&value)?;
        self.put(key, &json).await;
        Ok(json)
    }
}

// =============================================================================
// In-process backend
// =============================================================================

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_max_entries(ttl, MAX_MEMORY_ENTRIES)
    }

    pub fn with_max_entries(ttl: Duration, max_entries: usize) -> Self {
        MemoryCache {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    async fn put(&self, key: &str, value: &str) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| entry.expires_at > now);
            evict_oldest(&mut entries, self.max_entries - self.max_entries / 4);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + self.ttl,
            },
        );
    }
}

/// Drops the entries closest to expiry until fewer than `keep` remain. With
/// one TTL for every entry that is insertion order.
fn evict_oldest(entries: &mut HashMap<String, Entry>, keep: usize) {
    if entries.len() < keep {
        return;
    }

    let mut by_age: Vec<(Instant, String)> = entries
        .iter()
        .map(|(key, entry)| (entry.expires_at, key.clone()))
        .collect();
    by_age.sort_unstable();

    let excess = entries.len() + 1 - keep;
    for (_, key) in by_age.into_iter().take(excess) {
        entries.remove(&key);
    }
    debug!(evicted = excess, remaining = entries.len(), "Query cache evicted oldest entries");
}

// =============================================================================
// Redis backend
// =============================================================================

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisCache {
    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(format!("{KEY_PREFIX}{key}")).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(format!("{KEY_PREFIX}{key}"), value, self.ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}
