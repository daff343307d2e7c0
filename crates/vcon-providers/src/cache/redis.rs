//! Redis distributed cache provider.
//!
//! Exactly the GET / SETEX / DEL contract of the cache interface. The
//! connection manager reconnects on its own; every failure maps to
//! `Error::Cache` so callers degrade to direct store access.

use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use vcon_domain::constants::DEFAULT_CACHE_TTL_SECS;
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::cache::{CacheEntryConfig, CacheProvider, CacheStats};
use vcon_domain::registry::cache::{CACHE_PROVIDERS, CacheProviderConfig, CacheProviderEntry};

/// Redis-backed cache for multi-instance deployments.
pub struct RedisCacheProvider {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
    default_ttl_secs: u64,
}

impl RedisCacheProvider {
    /// Provider over the given connection URI; the connection itself is
    /// established lazily on first use.
    pub fn new(uri: &str, default_ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(uri)
            .map_err(|e| Error::cache(format!("invalid redis URI: {e}")))?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
            default_ttl_secs,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        self.manager
            .get_or_try_init(|| async {
                self.client
                    .get_connection_manager()
                    .await
                    .map_err(|e| Error::cache(format!("redis connect failed: {e}")))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| Error::cache(format!("GET {key}: {e}")))
    }

    async fn set_json(&self, key: &str, value: &str, config: CacheEntryConfig) -> Result<()> {
        let mut conn = self.connection().await?;
        let ttl_secs = config
            .ttl
            .map_or(self.default_ttl_secs, |ttl| ttl.as_secs().max(1));
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| Error::cache(format!("SETEX {key}: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| Error::cache(format!("DEL {key}: {e}")))?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn
            .keys(format!("{}*", vcon_domain::constants::CACHE_KEY_PREFIX))
            .await
            .map_err(|e| Error::cache(format!("KEYS: {e}")))?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| Error::cache(format!("DEL: {e}")))?;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut conn = self.connection().await?;
        let entries: i64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::cache(format!("DBSIZE: {e}")))?;
        Ok(CacheStats {
            hits: 0,
            misses: 0,
            entries: entries.max(0) as u64,
        })
    }

    fn provider_name(&self) -> &str {
        "redis"
    }
}

impl std::fmt::Debug for RedisCacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheProvider")
            .field("default_ttl_secs", &self.default_ttl_secs)
            .finish()
    }
}

// ============================================================================
// Auto-registration
// ============================================================================

fn redis_cache_factory(
    config: &CacheProviderConfig,
) -> std::result::Result<Arc<dyn CacheProvider>, String> {
    let uri = config
        .uri
        .as_deref()
        .ok_or_else(|| "redis cache provider requires a connection URI".to_owned())?;
    let ttl = config.ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    let provider = RedisCacheProvider::new(uri, ttl).map_err(|e| e.to_string())?;
    Ok(Arc::new(provider))
}

#[linkme::distributed_slice(CACHE_PROVIDERS)]
static REDIS_PROVIDER: CacheProviderEntry = CacheProviderEntry {
    name: "redis",
    description: "Redis distributed cache for multi-instance deployments",
    factory: redis_cache_factory,
};
