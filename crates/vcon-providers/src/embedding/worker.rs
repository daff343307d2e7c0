//! Queue-draining embedding worker.
//!
//! Claims batches of pending tasks, embeds their texts in one provider
//! call, and stores the vectors. A failing batch fails every claimed task
//! (retry accounting happens per task); the periodic sweep returns
//! retryable failures and stale claims to `pending`. Cancellation stops the
//! loop between batches, so an in-flight batch always settles.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vcon_domain::constants::MAX_EMBEDDING_RETRIES;
use vcon_domain::ports::{EmbeddingProvider, EmbeddingQueue};

/// Background worker over the queue and provider ports.
pub struct EmbeddingWorker {
    queue: Arc<dyn EmbeddingQueue>,
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    poll_interval: Duration,
    sweep_interval: Duration,
}

impl EmbeddingWorker {
    pub fn new(
        queue: Arc<dyn EmbeddingQueue>,
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        poll_interval: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            queue,
            provider,
            batch_size,
            poll_interval,
            sweep_interval,
        }
    }

    /// Run until the token is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!(
            provider = self.provider.provider_name(),
            batch_size = self.batch_size,
            "embedding worker started"
        );
        let mut poll = tokio::time::interval(self.poll_interval);
        let mut sweep = tokio::time::interval(self.sweep_interval);

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    info!("embedding worker stopping");
                    break;
                }
                _ = poll.tick() => {
                    self.drain().await;
                }
                _ = sweep.tick() => {
                    match self.queue.sweep(MAX_EMBEDDING_RETRIES).await {
                        Ok(0) => {}
                        Ok(n) => debug!(requeued = n, "swept failed embedding tasks"),
                        Err(e) => warn!(error = %e, "embedding task sweep failed"),
                    }
                }
            }
        }
    }

    /// Process batches until the queue momentarily runs dry.
    async fn drain(&self) {
        loop {
            let claimed = match self.queue.claim(self.batch_size).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!(error = %e, "failed to claim embedding tasks");
                    return;
                }
            };
            if claimed.is_empty() {
                return;
            }

            let texts: Vec<String> = claimed.iter().map(|t| t.content_text.clone()).collect();
            match self.provider.embed_batch(&texts).await {
                Ok(embeddings) if embeddings.len() == claimed.len() => {
                    for (task, embedding) in claimed.iter().zip(embeddings.iter()) {
                        if let Err(e) = self.queue.complete(task, embedding).await {
                            warn!(task = task.id, error = %e, "failed to store embedding");
                            let _ = self.queue.fail(task.id, &e.to_string()).await;
                        }
                    }
                    debug!(processed = claimed.len(), "embedding batch completed");
                }
                Ok(embeddings) => {
                    let message = format!(
                        "provider returned {} embeddings for {} texts",
                        embeddings.len(),
                        claimed.len()
                    );
                    warn!("{message}");
                    for task in &claimed {
                        let _ = self.queue.fail(task.id, &message).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "embedding batch failed");
                    for task in &claimed {
                        let _ = self.queue.fail(task.id, &e.to_string()).await;
                    }
                }
            }

            if claimed.len() < self.batch_size {
                return;
            }
        }
    }
}
