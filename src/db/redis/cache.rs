use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;

use crate::db::cache::CacheStore;
use crate::error::AppResult;
use crate::models::CacheSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Run snapshot for one primary user
    Snapshot(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Snapshot(steam_id) => write!(f, "friendplay:snapshot:{}", steam_id),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Snapshot stored under a single Redis key with a TTL
#[derive(Clone)]
pub struct RedisCacheStore {
    redis_client: Client,
    key: CacheKey,
    ttl: u64,
}

impl RedisCacheStore {
    pub fn new(redis_client: Client, steam_id: &str, ttl: u64) -> Self {
        Self {
            redis_client,
            key: CacheKey::Snapshot(steam_id.to_string()),
            ttl,
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisCacheStore {
    async fn load(&self) -> AppResult<Option<CacheSnapshot>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(self.key.to_string()).await?;

        match cached {
            Some(json) => {
                let snapshot: CacheSnapshot = serde_json::from_str(&json)?;
                tracing::debug!(key = %self.key, members = snapshot.members.len(), "Cache hit");
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &CacheSnapshot) -> AppResult<()> {
        let json = serde_json::to_string(snapshot)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        // SET EX rejects a zero expiry
        let _: () = conn.set_ex(self.key.to_string(), json, self.ttl.max(1)).await?;

        tracing::debug!(key = %self.key, ttl = self.ttl, "Saved cache snapshot");
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(self.key.to_string()).await?;
        tracing::info!(key = %self.key, "Cache cleared");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
