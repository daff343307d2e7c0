//! Embedding task queue port.
//!
//! The queue decouples write latency from vector generation. Tasks are
//! enqueued with the write that produced them and drained by a worker that
//! claims batches atomically (pending → processing), so concurrent workers
//! never double-process an item.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{EmbeddingTask, NewEmbeddingTask};
use crate::error::Result;
use crate::value_objects::Embedding;

/// Persistent queue of embedding work items.
#[async_trait]
pub trait EmbeddingQueue: Send + Sync {
    /// Enqueue tasks as `pending`, upserting on the task's identity so
    /// re-writing the same content resets rather than duplicates it.
    async fn enqueue(&self, tasks: &[NewEmbeddingTask]) -> Result<usize>;

    /// Atomically claim up to `batch` pending tasks, transitioning them to
    /// `processing`.
    async fn claim(&self, batch: usize) -> Result<Vec<EmbeddingTask>>;

    /// Store the produced vector (upsert on content identity) and mark the
    /// task `completed` in the same transaction.
    async fn complete(&self, task: &EmbeddingTask, embedding: &Embedding) -> Result<()>;

    /// Mark the task `failed`, recording the error and bumping the retry
    /// counter.
    async fn fail(&self, task_id: i64, error: &str) -> Result<()>;

    /// Return failed tasks below the retry ceiling (and stale `processing`
    /// tasks from crashed workers) to `pending`. Returns how many moved.
    async fn sweep(&self, max_retries: i32) -> Result<u64>;

    /// Drop all tasks of one vCon (delete cascade helper).
    async fn purge(&self, vcon_uuid: &Uuid) -> Result<u64>;

    /// Number of tasks currently pending.
    async fn pending_count(&self) -> Result<i64>;
}
