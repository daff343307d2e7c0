//! Embedding worker contract over an in-memory queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use vcon_domain::entities::{
    EmbeddingContentType, EmbeddingTask, NewEmbeddingTask, TaskStatus,
};
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::{EmbeddingProvider, EmbeddingQueue};
use vcon_domain::value_objects::Embedding;
use vcon_providers::embedding::EmbeddingWorker;

/// Queue holding tasks and stored vectors in memory.
#[derive(Default)]
struct InMemoryQueue {
    tasks: Mutex<Vec<EmbeddingTask>>,
    stored: Mutex<HashMap<(Uuid, String), Embedding>>,
}

impl InMemoryQueue {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn seed(&self, texts: &[&str]) {
        let mut tasks = self.tasks.lock().await;
        for (i, text) in texts.iter().enumerate() {
            tasks.push(EmbeddingTask {
                id: i as i64 + 1,
                vcon_uuid: Uuid::new_v4(),
                content_type: EmbeddingContentType::Dialog,
                content_reference: format!("dialog_{i}"),
                content_text: (*text).to_owned(),
                status: TaskStatus::Pending,
                retry_count: 0,
                created_at: Utc::now(),
            });
        }
    }

    async fn statuses(&self) -> Vec<TaskStatus> {
        self.tasks.lock().await.iter().map(|t| t.status).collect()
    }
}

#[async_trait]
impl EmbeddingQueue for InMemoryQueue {
    async fn enqueue(&self, new_tasks: &[NewEmbeddingTask]) -> Result<usize> {
        let mut tasks = self.tasks.lock().await;
        let base = tasks.len() as i64;
        for (i, task) in new_tasks.iter().enumerate() {
            tasks.push(EmbeddingTask {
                id: base + i as i64 + 1,
                vcon_uuid: task.vcon_uuid,
                content_type: task.content_type,
                content_reference: task.content_reference.clone(),
                content_text: task.content_text.clone(),
                status: TaskStatus::Pending,
                retry_count: 0,
                created_at: Utc::now(),
            });
        }
        Ok(new_tasks.len())
    }

    async fn claim(&self, batch: usize) -> Result<Vec<EmbeddingTask>> {
        let mut tasks = self.tasks.lock().await;
        let mut claimed = Vec::new();
        for task in tasks.iter_mut() {
            if claimed.len() >= batch {
                break;
            }
            if task.status == TaskStatus::Pending {
                task.status = TaskStatus::Processing;
                claimed.push(task.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete(&self, task: &EmbeddingTask, embedding: &Embedding) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if let Some(t) = tasks.iter_mut().find(|t| t.id == task.id) {
            t.status = TaskStatus::Completed;
        }
        self.stored.lock().await.insert(
            (task.vcon_uuid, task.content_reference.clone()),
            embedding.clone(),
        );
        Ok(())
    }

    async fn fail(&self, task_id: i64, _error: &str) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if let Some(t) = tasks.iter_mut().find(|t| t.id == task_id) {
            t.status = TaskStatus::Failed;
            t.retry_count += 1;
        }
        Ok(())
    }

    async fn sweep(&self, max_retries: i32) -> Result<u64> {
        let mut tasks = self.tasks.lock().await;
        let mut swept = 0;
        for t in tasks.iter_mut() {
            if t.status == TaskStatus::Failed && t.retry_count < max_retries {
                t.status = TaskStatus::Pending;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn purge(&self, vcon_uuid: &Uuid) -> Result<u64> {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| &t.vcon_uuid != vcon_uuid);
        Ok((before - tasks.len()) as u64)
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count() as i64)
    }
}

/// Deterministic provider; optionally fails every call.
struct StubProvider {
    failing: bool,
}

#[async_trait]
impl EmbeddingProvider for StubProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if self.failing {
            return Err(Error::embedding("vendor unavailable"));
        }
        Ok(texts
            .iter()
            .map(|_| Embedding {
                vector: vec![0.1; 384],
                model: "stub-model".to_owned(),
                dimensions: 384,
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        384
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

fn worker(queue: Arc<InMemoryQueue>, failing: bool) -> EmbeddingWorker {
    EmbeddingWorker::new(
        queue,
        Arc::new(StubProvider { failing }),
        2,
        Duration::from_millis(10),
        Duration::from_millis(25),
    )
}

async fn run_for(worker: EmbeddingWorker, duration: Duration) {
    let token = CancellationToken::new();
    let handle = tokio::spawn(worker.run(token.clone()));
    tokio::time::sleep(duration).await;
    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn drains_pending_tasks_to_completed() {
    let queue = InMemoryQueue::new();
    queue.seed(&["hello", "world", "third"]).await;

    run_for(worker(Arc::clone(&queue), false), Duration::from_millis(100)).await;

    assert!(queue
        .statuses()
        .await
        .iter()
        .all(|s| *s == TaskStatus::Completed));
    let stored = queue.stored.lock().await;
    assert_eq!(stored.len(), 3);
    let any = stored.values().next().unwrap();
    assert_eq!(any.dimensions, 384);
    assert_eq!(any.model, "stub-model");
}

#[tokio::test]
async fn provider_failure_marks_tasks_failed_and_sweep_requeues() {
    let queue = InMemoryQueue::new();
    queue.seed(&["doomed"]).await;

    run_for(worker(Arc::clone(&queue), true), Duration::from_millis(40)).await;

    // The task failed at least once and the sweep kept returning it to
    // pending while retries remained.
    let tasks = queue.tasks.lock().await;
    assert!(tasks[0].retry_count >= 1);
    assert!(queue.stored.try_lock().unwrap().is_empty());
}

#[tokio::test]
async fn pending_count_reaches_zero_after_drain() {
    let queue = InMemoryQueue::new();
    queue.seed(&["a", "b", "c", "d", "e"]).await;
    assert_eq!(queue.pending_count().await.unwrap(), 5);

    run_for(worker(Arc::clone(&queue), false), Duration::from_millis(150)).await;
    assert_eq!(queue.pending_count().await.unwrap(), 0);
}
