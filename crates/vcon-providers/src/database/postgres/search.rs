//! Keyword and semantic retrieval.
//!
//! Keyword search ranks weighted tsvectors with `ts_rank_cd` and falls back
//! to trigram similarity when full-text yields nothing (typo tolerance, and
//! queries with no dictionary-indexed terms). Semantic search is pgvector
//! cosine distance over the stored content vectors. Every query runs under
//! a local statement timeout; cancellation surfaces as `SearchTimeout`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use sqlx::postgres::PgRow;
use tracing::debug;

use vcon_domain::error::{Error, Result};
use vcon_domain::ports::SearchRepository;
use vcon_domain::value_objects::{KeywordHit, SearchFilters, SemanticHit};

use super::map_sqlx_error;
use super::rows::vector_literal;

const KEYWORD_SQL: &str = r"
WITH q AS (SELECT websearch_to_tsquery('english', $1) AS tsq)
SELECT * FROM (
    SELECT v.uuid AS vcon_uuid, 'subject' AS doc_type, NULL::int AS ref_index,
           ts_rank_cd(v.subject_tsv, q.tsq) AS rank,
           ts_headline('english', coalesce(v.subject, ''), q.tsq) AS snippet,
           v.created_at
      FROM q CROSS JOIN vcons v
     WHERE v.subject_tsv @@ q.tsq
    UNION ALL
    SELECT v.uuid, 'party', p.party_index,
           ts_rank_cd(p.party_tsv, q.tsq),
           coalesce(p.name, p.mailto, p.tel),
           v.created_at
      FROM q CROSS JOIN parties p JOIN vcons v ON v.id = p.vcon_id
     WHERE p.party_tsv @@ q.tsq
    UNION ALL
    SELECT v.uuid, 'dialog', d.dialog_index,
           ts_rank_cd(d.body_tsv, q.tsq),
           ts_headline('english', coalesce(d.body, ''), q.tsq),
           v.created_at
      FROM q CROSS JOIN dialogs d JOIN vcons v ON v.id = d.vcon_id
     WHERE d.body_tsv @@ q.tsq
    UNION ALL
    SELECT v.uuid, 'analysis', a.analysis_index,
           ts_rank_cd(a.body_tsv, q.tsq),
           ts_headline('english', coalesce(a.body, ''), q.tsq),
           v.created_at
      FROM q CROSS JOIN analyses a JOIN vcons v ON v.id = a.vcon_id
     WHERE a.body_tsv @@ q.tsq
) hits
WHERE ($2::timestamptz IS NULL OR hits.created_at >= $2)
  AND ($3::timestamptz IS NULL OR hits.created_at <= $3)
  AND ($4::jsonb IS NULL OR EXISTS (
        SELECT 1 FROM vcon_tags t JOIN vcons tv ON tv.id = t.vcon_id
         WHERE tv.uuid = hits.vcon_uuid AND t.tags_object @> $4::jsonb))
ORDER BY rank DESC, created_at DESC, vcon_uuid
LIMIT $5
";

const TRIGRAM_SQL: &str = r"
SELECT * FROM (
    SELECT v.uuid AS vcon_uuid, 'subject' AS doc_type, NULL::int AS ref_index,
           similarity(coalesce(v.subject, ''), $1) AS rank,
           v.subject AS snippet,
           v.created_at
      FROM vcons v
     WHERE v.subject % $1
    UNION ALL
    SELECT v.uuid, 'party', p.party_index,
           greatest(similarity(coalesce(p.name, ''), $1),
                    similarity(coalesce(p.mailto, ''), $1),
                    similarity(coalesce(p.tel, ''), $1)),
           coalesce(p.name, p.mailto, p.tel),
           v.created_at
      FROM parties p JOIN vcons v ON v.id = p.vcon_id
     WHERE p.name % $1 OR p.mailto % $1 OR p.tel % $1
    UNION ALL
    SELECT v.uuid, 'dialog', d.dialog_index,
           similarity(coalesce(d.body, ''), $1),
           left(d.body, 160),
           v.created_at
      FROM dialogs d JOIN vcons v ON v.id = d.vcon_id
     WHERE (d.encoding IS NULL OR d.encoding = 'none') AND d.body % $1
    UNION ALL
    SELECT v.uuid, 'analysis', a.analysis_index,
           similarity(coalesce(a.body, ''), $1),
           left(a.body, 160),
           v.created_at
      FROM analyses a JOIN vcons v ON v.id = a.vcon_id
     WHERE a.encoding IS DISTINCT FROM 'base64url' AND a.body % $1
) hits
WHERE ($2::timestamptz IS NULL OR hits.created_at >= $2)
  AND ($3::timestamptz IS NULL OR hits.created_at <= $3)
  AND ($4::jsonb IS NULL OR EXISTS (
        SELECT 1 FROM vcon_tags t JOIN vcons tv ON tv.id = t.vcon_id
         WHERE tv.uuid = hits.vcon_uuid AND t.tags_object @> $4::jsonb))
ORDER BY rank DESC, created_at DESC, vcon_uuid
LIMIT $5
";

const SEMANTIC_SQL: &str = r"
SELECT v.uuid AS vcon_uuid, e.content_type, e.content_reference, e.content_text,
       1 - (e.embedding <=> $1::vector) AS similarity
  FROM vcon_embeddings e
  JOIN vcons v ON v.id = e.vcon_id
 WHERE 1 - (e.embedding <=> $1::vector) >= $2
   AND ($3::timestamptz IS NULL OR v.created_at >= $3)
   AND ($4::timestamptz IS NULL OR v.created_at <= $4)
   AND ($5::jsonb IS NULL OR EXISTS (
         SELECT 1 FROM vcon_tags t
          WHERE t.vcon_id = v.id AND t.tags_object @> $5::jsonb))
 ORDER BY e.embedding <=> $1::vector
 LIMIT $6
";

/// sqlx-backed implementation of [`SearchRepository`].
pub struct PostgresSearchRepository {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PostgresSearchRepository {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Begin a transaction with the configured `SET LOCAL statement_timeout`.
    async fn begin_limited(&self) -> Result<sqlx::Transaction<'_, sqlx::Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("search", e))?;
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("search", e))?;
        Ok(tx)
    }
}

#[async_trait]
impl SearchRepository for PostgresSearchRepository {
    async fn keyword(&self, query: &str, filters: &SearchFilters) -> Result<Vec<KeywordHit>> {
        let tags = tags_filter(filters);
        let limit = filters.effective_limit() as i64;

        let mut tx = self.begin_limited().await?;
        let rows = sqlx::query(KEYWORD_SQL)
            .bind(query)
            .bind(filters.start_date)
            .bind(filters.end_date)
            .bind(tags.clone())
            .bind(limit)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("keyword_search", e))?;

        if !rows.is_empty() {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("keyword_search", e))?;
            return rows.iter().map(row_to_keyword_hit).collect();
        }

        // No dictionary match; try trigram similarity for typo tolerance.
        debug!(query, "full-text found nothing, trying trigram fallback");
        let rows = sqlx::query(TRIGRAM_SQL)
            .bind(query)
            .bind(filters.start_date)
            .bind(filters.end_date)
            .bind(tags)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("keyword_search", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("keyword_search", e))?;
        rows.iter().map(row_to_keyword_hit).collect()
    }

    async fn semantic(
        &self,
        vector: &[f32],
        threshold: f32,
        filters: &SearchFilters,
    ) -> Result<Vec<SemanticHit>> {
        let literal = vector_literal(vector);
        let mut tx = self.begin_limited().await?;
        let rows = sqlx::query(SEMANTIC_SQL)
            .bind(literal)
            .bind(f64::from(threshold))
            .bind(filters.start_date)
            .bind(filters.end_date)
            .bind(tags_filter(filters))
            .bind(filters.effective_limit() as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("semantic_search", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("semantic_search", e))?;
        rows.iter().map(row_to_semantic_hit).collect()
    }
}

fn tags_filter(filters: &SearchFilters) -> Option<serde_json::Value> {
    filters
        .tags
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|t| serde_json::json!(t))
}

fn row_to_keyword_hit(row: &PgRow) -> Result<KeywordHit> {
    let doc_type: String = row
        .try_get("doc_type")
        .map_err(|e| map_sqlx_error("search", e))?;
    Ok(KeywordHit {
        vcon_uuid: row
            .try_get("vcon_uuid")
            .map_err(|e| map_sqlx_error("search", e))?,
        doc_type: doc_type
            .parse()
            .map_err(|e: String| Error::storage(format!("column 'doc_type': {e}")))?,
        ref_index: row
            .try_get("ref_index")
            .map_err(|e| map_sqlx_error("search", e))?,
        rank: row
            .try_get("rank")
            .map_err(|e| map_sqlx_error("search", e))?,
        snippet: row
            .try_get("snippet")
            .map_err(|e| map_sqlx_error("search", e))?,
    })
}

fn row_to_semantic_hit(row: &PgRow) -> Result<SemanticHit> {
    let content_type: String = row
        .try_get("content_type")
        .map_err(|e| map_sqlx_error("search", e))?;
    let similarity: f64 = row
        .try_get("similarity")
        .map_err(|e| map_sqlx_error("search", e))?;
    Ok(SemanticHit {
        vcon_uuid: row
            .try_get("vcon_uuid")
            .map_err(|e| map_sqlx_error("search", e))?,
        content_type: content_type
            .parse()
            .map_err(|e: String| Error::storage(format!("column 'content_type': {e}")))?,
        content_reference: row
            .try_get("content_reference")
            .map_err(|e| map_sqlx_error("search", e))?,
        content_text: row
            .try_get("content_text")
            .map_err(|e| map_sqlx_error("search", e))?,
        similarity: similarity as f32,
    })
}
