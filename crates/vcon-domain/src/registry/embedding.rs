//! Embedding provider registry.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ports::EmbeddingProvider;

/// Configuration for embedding provider creation.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingProviderConfig {
    /// Provider name (e.g. "fastembed").
    pub provider: String,
    /// Model identifier, provider-specific.
    pub model: Option<String>,
    /// Expected vector dimensionality.
    pub dimensions: Option<usize>,
}

/// Registry entry for an embedding provider factory.
pub struct EmbeddingProviderEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub factory:
        fn(&EmbeddingProviderConfig) -> std::result::Result<Arc<dyn EmbeddingProvider>, String>,
}

#[linkme::distributed_slice]
pub static EMBEDDING_PROVIDERS: [EmbeddingProviderEntry] = [..];

/// Build the embedding provider the configuration names.
pub fn resolve_embedding_provider(
    config: &EmbeddingProviderConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let entry = EMBEDDING_PROVIDERS
        .iter()
        .find(|e| e.name == config.provider)
        .ok_or_else(|| Error::ConfigInvalid {
            key: "embedding.provider".to_owned(),
            message: format!(
                "unknown embedding provider '{}' (registered: {})",
                config.provider,
                EMBEDDING_PROVIDERS
                    .iter()
                    .map(|e| e.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })?;
    (entry.factory)(config).map_err(|message| Error::ConfigInvalid {
        key: "embedding.provider".to_owned(),
        message,
    })
}
