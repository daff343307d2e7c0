//! Local embedding provider over fastembed.
//!
//! Runs the ONNX model in-process, so semantic indexing works without any
//! external vendor. Inference is CPU-bound and runs on the blocking pool.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use vcon_domain::constants::EMBEDDING_DIMENSIONS;
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::EmbeddingProvider;
use vcon_domain::registry::embedding::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use vcon_domain::value_objects::Embedding;

/// fastembed-backed implementation of [`EmbeddingProvider`].
pub struct FastembedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl FastembedProvider {
    /// Load the named model (downloads on first use, then cached on disk).
    pub fn new(model_name: &str) -> Result<Self> {
        let (model_kind, dimensions) = resolve_model(model_name)?;
        let model = TextEmbedding::try_new(
            InitOptions::new(model_kind).with_show_download_progress(false),
        )
        .map_err(|e| Error::embedding(format!("failed to load model '{model_name}': {e}")))?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: model_name.to_owned(),
            dimensions,
        })
    }
}

fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    match name {
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Ok((EmbeddingModel::AllMiniLML6V2, EMBEDDING_DIMENSIONS))
        }
        "bge-small-en-v1.5" | "BAAI/bge-small-en-v1.5" => {
            Ok((EmbeddingModel::BGESmallENV15, EMBEDDING_DIMENSIONS))
        }
        other => Err(Error::embedding(format!(
            "unsupported embedding model '{other}' \
             (supported: all-MiniLM-L6-v2, bge-small-en-v1.5)"
        ))),
    }
}

#[async_trait]
impl EmbeddingProvider for FastembedProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let model_name = self.model_name.clone();
        let dimensions = self.dimensions;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| Error::embedding("embedding model lock poisoned"))?;
            let vectors = model
                .embed(texts, None)
                .map_err(|e| Error::embedding(format!("inference failed: {e}")))?;
            Ok(vectors
                .into_iter()
                .map(|vector| Embedding {
                    vector,
                    model: model_name.clone(),
                    dimensions,
                })
                .collect())
        })
        .await
        .map_err(|e| Error::embedding(format!("inference task panicked: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

// ============================================================================
// Auto-registration
// ============================================================================

fn fastembed_factory(
    config: &EmbeddingProviderConfig,
) -> std::result::Result<Arc<dyn EmbeddingProvider>, String> {
    let model = config.model.as_deref().unwrap_or("all-MiniLM-L6-v2");
    let provider = FastembedProvider::new(model).map_err(|e| e.to_string())?;
    if let Some(expected) = config.dimensions
        && expected != provider.dimensions()
    {
        return Err(format!(
            "model '{model}' produces {} dimensions, configuration expects {expected}",
            provider.dimensions()
        ));
    }
    Ok(Arc::new(provider))
}

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static FASTEMBED_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "fastembed",
    description: "Local ONNX text embeddings, no external vendor required",
    factory: fastembed_factory,
};
