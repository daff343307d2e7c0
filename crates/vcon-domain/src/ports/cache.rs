//! Cache provider port.
//!
//! The cache is never a correctness dependency: every failure is reported
//! as `Error::Cache` and callers degrade to direct store access.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Per-entry write options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheEntryConfig {
    /// Time to live; `None` means the provider default.
    pub ttl: Option<Duration>,
}

impl CacheEntryConfig {
    /// Entry config with an explicit TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// Counters reported by [`CacheProvider::stats`].
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Key/value cache holding serialized vCons.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug {
    async fn get_json(&self, key: &str) -> Result<Option<String>>;
    async fn set_json(&self, key: &str, value: &str, config: CacheEntryConfig) -> Result<()>;
    /// Remove an entry; returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn stats(&self) -> Result<CacheStats>;
    fn provider_name(&self) -> &str;
}
