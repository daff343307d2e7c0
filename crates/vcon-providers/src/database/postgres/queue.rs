//! Embedding task queue adapter.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so concurrent workers never hand out
//! the same task twice. Task identity is `(vcon, content_type,
//! content_reference)`: re-enqueueing the same content resets the existing
//! row to `pending` instead of duplicating it, and the produced vector
//! upserts on the same identity.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use vcon_domain::entities::{EmbeddingTask, NewEmbeddingTask};
use vcon_domain::error::Result;
use vcon_domain::ports::EmbeddingQueue;
use vcon_domain::value_objects::Embedding;

use super::map_sqlx_error;
use super::rows::{row_to_task, vector_literal};

/// Stale `processing` tasks older than this are returned to `pending` by
/// the sweep (crashed worker recovery).
const STALE_PROCESSING: &str = "10 minutes";

/// sqlx-backed implementation of [`EmbeddingQueue`].
pub struct PostgresEmbeddingQueue {
    pool: PgPool,
}

impl PostgresEmbeddingQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmbeddingQueue for PostgresEmbeddingQueue {
    async fn enqueue(&self, tasks: &[NewEmbeddingTask]) -> Result<usize> {
        if tasks.is_empty() {
            return Ok(0);
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("enqueue", e))?;
        let mut enqueued = 0usize;
        for task in tasks {
            let result = sqlx::query(
                r"
                INSERT INTO embedding_tasks (vcon_id, content_type, content_reference, content_text)
                SELECT v.id, $2, $3, $4 FROM vcons v WHERE v.uuid = $1
                ON CONFLICT (vcon_id, content_type, content_reference) DO UPDATE SET
                    content_text = excluded.content_text,
                    status = 'pending',
                    retry_count = 0,
                    last_error = NULL,
                    updated_at = now()
                ",
            )
            .bind(task.vcon_uuid)
            .bind(task.content_type.as_str())
            .bind(&task.content_reference)
            .bind(&task.content_text)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("enqueue", e))?;
            enqueued += result.rows_affected() as usize;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("enqueue", e))?;
        Ok(enqueued)
    }

    async fn claim(&self, batch: usize) -> Result<Vec<EmbeddingTask>> {
        let rows = sqlx::query(
            r"
            UPDATE embedding_tasks AS t
               SET status = 'processing', updated_at = now()
              FROM vcons v
             WHERE v.id = t.vcon_id
               AND t.id IN (SELECT id FROM embedding_tasks
                             WHERE status = 'pending'
                             ORDER BY created_at
                             LIMIT $1
                               FOR UPDATE SKIP LOCKED)
            RETURNING t.id, v.uuid AS vcon_uuid, t.content_type, t.content_reference,
                      t.content_text, t.status, t.retry_count, t.created_at
            ",
        )
        .bind(batch as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim", e))?;
        rows.iter().map(row_to_task).collect()
    }

    async fn complete(&self, task: &EmbeddingTask, embedding: &Embedding) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("complete", e))?;

        sqlx::query(
            r"
            INSERT INTO vcon_embeddings (vcon_id, content_type, content_reference,
                                         content_text, embedding, model, dimension)
            SELECT v.id, $2, $3, $4, $5::vector, $6, $7 FROM vcons v WHERE v.uuid = $1
            ON CONFLICT (vcon_id, content_type, content_reference) DO UPDATE SET
                content_text = excluded.content_text,
                embedding = excluded.embedding,
                model = excluded.model,
                dimension = excluded.dimension
            ",
        )
        .bind(task.vcon_uuid)
        .bind(task.content_type.as_str())
        .bind(&task.content_reference)
        .bind(&task.content_text)
        .bind(vector_literal(&embedding.vector))
        .bind(&embedding.model)
        .bind(embedding.dimensions as i32)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("complete", e))?;

        sqlx::query(
            "UPDATE embedding_tasks SET status = 'completed', updated_at = now() WHERE id = $1",
        )
        .bind(task.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("complete", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("complete", e))?;
        debug!(task = task.id, reference = %task.content_reference, "embedding stored");
        Ok(())
    }

    async fn fail(&self, task_id: i64, error: &str) -> Result<()> {
        sqlx::query(
            r"
            UPDATE embedding_tasks
               SET status = 'failed', retry_count = retry_count + 1,
                   last_error = $2, updated_at = now()
             WHERE id = $1
            ",
        )
        .bind(task_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fail", e))?;
        Ok(())
    }

    async fn sweep(&self, max_retries: i32) -> Result<u64> {
        let result = sqlx::query(&format!(
            r"
            UPDATE embedding_tasks
               SET status = 'pending', updated_at = now()
             WHERE (status = 'failed' AND retry_count < $1)
                OR (status = 'processing' AND updated_at < now() - interval '{STALE_PROCESSING}')
            ",
        ))
        .bind(max_retries)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("sweep", e))?;
        Ok(result.rows_affected())
    }

    async fn purge(&self, vcon_uuid: &Uuid) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM embedding_tasks t
             USING vcons v
             WHERE v.id = t.vcon_id AND v.uuid = $1
            ",
        )
        .bind(vcon_uuid)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("purge", e))?;
        Ok(result.rows_affected())
    }

    async fn pending_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM embedding_tasks WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("pending_count", e))?;
        row.try_get("n").map_err(|e| map_sqlx_error("pending_count", e))
    }
}
