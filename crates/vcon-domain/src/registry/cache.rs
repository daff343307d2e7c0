//! Cache provider registry.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ports::CacheProvider;

/// Configuration for cache provider creation.
///
/// Providers use what they need and ignore the rest.
#[derive(Debug, Clone, Default)]
pub struct CacheProviderConfig {
    /// Provider name (e.g. "moka", "redis").
    pub provider: String,
    /// Connection URI (distributed caches).
    pub uri: Option<String>,
    /// Maximum entry count (in-process caches).
    pub max_capacity: Option<u64>,
    /// Default TTL in seconds.
    pub ttl_secs: Option<u64>,
}

/// Registry entry for a cache provider factory.
pub struct CacheProviderEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: fn(&CacheProviderConfig) -> std::result::Result<Arc<dyn CacheProvider>, String>,
}

#[linkme::distributed_slice]
pub static CACHE_PROVIDERS: [CacheProviderEntry] = [..];

/// Build the cache provider the configuration names.
pub fn resolve_cache_provider(config: &CacheProviderConfig) -> Result<Arc<dyn CacheProvider>> {
    let entry = CACHE_PROVIDERS
        .iter()
        .find(|e| e.name == config.provider)
        .ok_or_else(|| Error::ConfigInvalid {
            key: "cache.provider".to_owned(),
            message: format!(
                "unknown cache provider '{}' (registered: {})",
                config.provider,
                registered_names().join(", ")
            ),
        })?;
    (entry.factory)(config).map_err(|message| Error::ConfigInvalid {
        key: "cache.provider".to_owned(),
        message,
    })
}

fn registered_names() -> Vec<&'static str> {
    CACHE_PROVIDERS.iter().map(|e| e.name).collect()
}
