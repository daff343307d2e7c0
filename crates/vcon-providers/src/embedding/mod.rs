//! Embedding provider and the queue-draining worker.

/// Local fastembed provider
pub mod fastembed;
/// Background worker draining the embedding task queue
pub mod worker;

pub use fastembed::FastembedProvider;
pub use worker::EmbeddingWorker;
