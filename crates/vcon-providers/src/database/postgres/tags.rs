//! Tag subsystem adapter.
//!
//! The `tags` attachment row is the source of truth; `vcon_tags` is a
//! materialized view over it for containment queries. Every mutation
//! rewrites the attachment under the parent row lock, bumps `updated_at`,
//! keeps attachment indexes dense, and refreshes the view afterwards
//! (concurrently, outside the transaction). Queries join `vcons` so rows of
//! deleted vCons never surface from a stale view.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use vcon_domain::error::{Error, Result};
use vcon_domain::ports::TagRepository;
use vcon_domain::tags::{parse_tags_body, serialize_tags};
use vcon_domain::value_objects::{UniqueTagsOptions, UniqueTagsReport};

use super::map_sqlx_error;

/// sqlx-backed implementation of [`TagRepository`].
pub struct PostgresTagRepository {
    pool: PgPool,
}

impl PostgresTagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn refresh_view(&self) -> Result<()> {
        sqlx::query("REFRESH MATERIALIZED VIEW CONCURRENTLY vcon_tags")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("refresh_tags", e))?;
        Ok(())
    }
}

#[async_trait]
impl TagRepository for PostgresTagRepository {
    async fn get_tags(&self, uuid: &Uuid) -> Result<BTreeMap<String, String>> {
        let row = sqlx::query(
            r"
            SELECT a.body
              FROM vcons v
              LEFT JOIN attachments a
                ON a.vcon_id = v.id AND a.type = 'tags' AND a.encoding = 'json'
             WHERE v.uuid = $1
            ",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_tags", e))?
        .ok_or_else(|| Error::not_found(format!("vCon {uuid}")))?;

        let body: Option<String> = row
            .try_get("body")
            .map_err(|e| map_sqlx_error("get_tags", e))?;
        match body {
            Some(body) => parse_tags_body(&body),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn put_tags(&self, uuid: &Uuid, tags: &BTreeMap<String, String>) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("put_tags", e))?;

        let parent = sqlx::query("SELECT id FROM vcons WHERE uuid = $1 FOR UPDATE")
            .bind(uuid)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("put_tags", e))?
            .ok_or_else(|| Error::not_found(format!("vCon {uuid}")))?;
        let vcon_id: i64 = parent
            .try_get("id")
            .map_err(|e| map_sqlx_error("put_tags", e))?;

        let existing = sqlx::query(
            r"
            SELECT id, attachment_index FROM attachments
             WHERE vcon_id = $1 AND type = 'tags' AND encoding = 'json'
            ",
        )
        .bind(vcon_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("put_tags", e))?;

        if tags.is_empty() {
            if let Some(row) = existing {
                let attachment_id: i64 = row
                    .try_get("id")
                    .map_err(|e| map_sqlx_error("put_tags", e))?;
                let removed_index: i32 = row
                    .try_get("attachment_index")
                    .map_err(|e| map_sqlx_error("put_tags", e))?;
                sqlx::query("DELETE FROM attachments WHERE id = $1")
                    .bind(attachment_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("put_tags", e))?;
                // Close the index hole left behind.
                sqlx::query(
                    r"
                    UPDATE attachments SET attachment_index = attachment_index - 1
                     WHERE vcon_id = $1 AND attachment_index > $2
                    ",
                )
                .bind(vcon_id)
                .bind(removed_index)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("put_tags", e))?;
            }
        } else {
            let body = serialize_tags(tags);
            if let Some(row) = existing {
                let attachment_id: i64 = row
                    .try_get("id")
                    .map_err(|e| map_sqlx_error("put_tags", e))?;
                sqlx::query("UPDATE attachments SET body = $2 WHERE id = $1")
                    .bind(attachment_id)
                    .bind(&body)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("put_tags", e))?;
            } else {
                sqlx::query(
                    r"
                    INSERT INTO attachments (vcon_id, attachment_index, type, mimetype, body, encoding)
                    SELECT $1, COALESCE(MAX(attachment_index) + 1, 0), 'tags', 'application/json', $2, 'json'
                      FROM attachments WHERE vcon_id = $1
                    ",
                )
                .bind(vcon_id)
                .bind(&body)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("put_tags", e))?;
            }
        }

        sqlx::query("UPDATE vcons SET updated_at = now() WHERE id = $1")
            .bind(vcon_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("put_tags", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("put_tags", e))?;

        self.refresh_view().await?;
        debug!(uuid = %uuid, count = tags.len(), "tags rewritten");
        Ok(())
    }

    async fn search_by_tags(
        &self,
        tags: &BTreeMap<String, String>,
        limit: usize,
    ) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r"
            SELECT v.uuid
              FROM vcon_tags t
              JOIN vcons v ON v.id = t.vcon_id
             WHERE t.tags_object @> $1::jsonb
             ORDER BY v.created_at DESC, v.uuid
             LIMIT $2
            ",
        )
        .bind(serde_json::json!(tags))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_by_tags", e))?;

        rows.iter()
            .map(|row| {
                row.try_get("uuid")
                    .map_err(|e| map_sqlx_error("search_by_tags", e))
            })
            .collect()
    }

    async fn unique_tags(&self, options: &UniqueTagsOptions) -> Result<UniqueTagsReport> {
        let rows = sqlx::query(
            r"
            SELECT kv.key, kv.value, COUNT(*) AS n
              FROM vcon_tags t
              JOIN vcons v ON v.id = t.vcon_id
              CROSS JOIN LATERAL jsonb_each_text(t.tags_object) AS kv(key, value)
             WHERE ($1::text IS NULL OR kv.key = $1)
             GROUP BY kv.key, kv.value
            HAVING ($2::bigint IS NULL OR COUNT(*) >= $2)
             ORDER BY kv.key, kv.value
            ",
        )
        .bind(&options.key_filter)
        .bind(options.min_count)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("unique_tags", e))?;

        let mut tags_by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut counts: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
        for row in &rows {
            let key: String = row
                .try_get("key")
                .map_err(|e| map_sqlx_error("unique_tags", e))?;
            let value: String = row
                .try_get("value")
                .map_err(|e| map_sqlx_error("unique_tags", e))?;
            let n: i64 = row
                .try_get("n")
                .map_err(|e| map_sqlx_error("unique_tags", e))?;
            tags_by_key.entry(key.clone()).or_default().push(value.clone());
            counts.entry(key).or_default().insert(value, n);
        }

        Ok(UniqueTagsReport {
            keys: tags_by_key.keys().cloned().collect(),
            tags_by_key,
            counts_per_value: options.include_counts.then_some(counts),
        })
    }
}
