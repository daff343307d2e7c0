//! Port interfaces implemented by the provider layer.

/// Cache provider port
pub mod cache;
/// Embedding provider port
pub mod embedding;
/// Plugin / lifecycle-hook port
pub mod plugin;
/// Embedding task queue port
pub mod queue;
/// vCon persistence port
pub mod repository;
/// Retrieval ports
pub mod search;
/// Tenant session-context port
pub mod tenant;

pub use cache::{CacheEntryConfig, CacheProvider, CacheStats};
pub use embedding::EmbeddingProvider;
pub use plugin::{PluginConfig, PluginTool, VconPlugin};
pub use queue::EmbeddingQueue;
pub use repository::VconRepository;
pub use search::{SearchRepository, TagRepository};
pub use tenant::TenantContext;
