//! Moka in-process cache provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;

use vcon_domain::error::Result;
use vcon_domain::ports::cache::{CacheEntryConfig, CacheProvider, CacheStats};
use vcon_domain::registry::cache::{CACHE_PROVIDERS, CacheProviderConfig, CacheProviderEntry};

/// Concurrent in-process cache. Entries carry their own expiry so per-entry
/// TTLs shorter than the cache-wide one are honored.
#[derive(Clone)]
pub struct MokaCacheProvider {
    cache: Cache<String, CachedValue>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

#[derive(Clone)]
struct CachedValue {
    json: String,
    expires_at: Option<Instant>,
}

impl MokaCacheProvider {
    /// Cache with the given entry capacity and default TTL.
    #[must_use]
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(default_ttl)
            .build();
        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl CacheProvider for MokaCacheProvider {
    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        if let Some(cached) = self.cache.get(key).await {
            if cached
                .expires_at
                .is_some_and(|expires_at| Instant::now() >= expires_at)
            {
                self.cache.invalidate(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok(Some(cached.json))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Ok(None)
        }
    }

    async fn set_json(&self, key: &str, value: &str, config: CacheEntryConfig) -> Result<()> {
        let expires_at = config.ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.cache
            .insert(
                key.to_owned(),
                CachedValue {
                    json: value.to_owned(),
                    expires_at,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.cache.contains_key(key);
        self.cache.invalidate(key).await;
        Ok(existed)
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.cache.run_pending_tasks().await;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        })
    }

    fn provider_name(&self) -> &str {
        "moka"
    }
}

impl std::fmt::Debug for MokaCacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheProvider")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

// ============================================================================
// Auto-registration
// ============================================================================

fn moka_cache_factory(
    config: &CacheProviderConfig,
) -> std::result::Result<Arc<dyn CacheProvider>, String> {
    let max_capacity = config.max_capacity.unwrap_or(10_000);
    let ttl = Duration::from_secs(
        config
            .ttl_secs
            .unwrap_or(vcon_domain::constants::DEFAULT_CACHE_TTL_SECS),
    );
    Ok(Arc::new(MokaCacheProvider::new(max_capacity, ttl)))
}

#[linkme::distributed_slice(CACHE_PROVIDERS)]
static MOKA_PROVIDER: CacheProviderEntry = CacheProviderEntry {
    name: "moka",
    description: "In-process cache for single-instance deployments",
    factory: moka_cache_factory,
};
