//! Provider auto-registration.
//!
//! Providers register themselves into linkme distributed slices at link
//! time; the infrastructure layer resolves them by configured name. A crate
//! that is never linked contributes nothing, so the provider set is decided
//! by the dependency graph plus configuration, not by a hand-maintained
//! match.

/// Cache provider registry
pub mod cache;
/// Embedding provider registry
pub mod embedding;
/// Plugin registry
pub mod plugin;

pub use cache::{CACHE_PROVIDERS, CacheProviderConfig, CacheProviderEntry, resolve_cache_provider};
pub use embedding::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
    resolve_embedding_provider,
};
pub use plugin::{PluginEntry, VCON_PLUGINS, resolve_plugins};
