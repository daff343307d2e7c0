//! Normalized vCon persistence.
//!
//! One transaction per write. `create` claims the uuid by inserting the
//! parent row first (the unique index is the lock); `update` takes
//! `SELECT ... FOR UPDATE` on the parent before touching children, so
//! concurrent writers against the same vCon serialize at the database.
//! Children are written in array order and their indexes stay dense from
//! zero.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use vcon_domain::entities::{Analysis, Attachment, Dialog, Group, Party, Vcon};
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::VconRepository;
use vcon_domain::validation::{validate_analysis, validate_attachment, validate_dialog};
use vcon_domain::value_objects::{DatabaseShape, DatabaseStats, VconMetadata, VconUpdate};

use super::map_sqlx_error;
use super::rows;

/// sqlx-backed implementation of [`VconRepository`].
pub struct PostgresVconRepository {
    pool: PgPool,
}

impl PostgresVconRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VconRepository for PostgresVconRepository {
    async fn create(&self, vcon: &Vcon, tenant_id: Option<&str>) -> Result<VconMetadata> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create", e))?;

        let row = sqlx::query(
            r"
            INSERT INTO vcons (uuid, vcon_version, subject, extensions, must_support,
                               redacted, appended, tenant_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, now()), now())
            RETURNING id, uuid, subject, created_at, updated_at, tenant_id
            ",
        )
        .bind(vcon.uuid)
        .bind(&vcon.version)
        .bind(&vcon.subject)
        .bind(vcon.extensions.as_ref().map(|v| serde_json::json!(v)))
        .bind(vcon.must_support.as_ref().map(|v| serde_json::json!(v)))
        .bind(&vcon.redacted)
        .bind(&vcon.appended)
        .bind(tenant_id)
        .bind(vcon.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create", e))?;

        let vcon_id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("create", e))?;

        for (i, party) in vcon.parties.iter().enumerate() {
            insert_party(&mut tx, vcon_id, i as i32, party).await?;
        }
        for (i, dialog) in vcon.dialog.iter().enumerate() {
            insert_dialog(&mut tx, vcon_id, i as i32, dialog).await?;
        }
        for (i, analysis) in vcon.analysis.iter().enumerate() {
            insert_analysis(&mut tx, vcon_id, i as i32, analysis).await?;
        }
        for (i, attachment) in vcon.attachments.iter().enumerate() {
            insert_attachment(&mut tx, vcon_id, i as i32, attachment).await?;
        }
        if let Some(groups) = &vcon.group {
            for (i, group) in groups.iter().enumerate() {
                insert_group(&mut tx, vcon_id, i as i32, group).await?;
            }
        }

        let metadata = rows::row_to_metadata(&row)?;
        tx.commit().await.map_err(|e| map_sqlx_error("create", e))?;
        debug!(uuid = %vcon.uuid, "vCon stored");
        Ok(metadata)
    }

    async fn get(&self, uuid: &Uuid) -> Result<Option<Vcon>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        fetch_full(&mut conn, uuid).await
    }

    async fn update(&self, uuid: &Uuid, patch: &VconUpdate) -> Result<Vcon> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("update", e))?;

        let locked = sqlx::query("SELECT id FROM vcons WHERE uuid = $1 FOR UPDATE")
            .bind(uuid)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update", e))?;
        let vcon_id: i64 = match locked {
            Some(row) => row
                .try_get("id")
                .map_err(|e| map_sqlx_error("update", e))?,
            None => return Err(Error::not_found(format!("vCon {uuid}"))),
        };

        sqlx::query(
            r"
            UPDATE vcons SET
                subject      = COALESCE($2, subject),
                extensions   = COALESCE($3, extensions),
                must_support = COALESCE($4, must_support),
                redacted     = COALESCE($5, redacted),
                appended     = COALESCE($6, appended),
                updated_at   = now()
            WHERE id = $1
            ",
        )
        .bind(vcon_id)
        .bind(&patch.subject)
        .bind(patch.extensions.as_ref().map(|v| serde_json::json!(v)))
        .bind(patch.must_support.as_ref().map(|v| serde_json::json!(v)))
        .bind(&patch.redacted)
        .bind(&patch.appended)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        append_children(&mut tx, vcon_id, patch).await?;

        let updated = fetch_full(&mut tx, uuid)
            .await?
            .ok_or_else(|| Error::internal("updated vCon vanished inside its own transaction"))?;
        tx.commit().await.map_err(|e| map_sqlx_error("update", e))?;
        Ok(updated)
    }

    async fn delete(&self, uuid: &Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vcons WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<VconMetadata>> {
        let rows = sqlx::query(
            r"
            SELECT uuid, subject, created_at, updated_at, tenant_id
            FROM vcons ORDER BY updated_at DESC LIMIT $1
            ",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_recent", e))?;
        rows.iter().map(rows::row_to_metadata).collect()
    }

    async fn list_by_ids(&self, uuids: &[Uuid]) -> Result<Vec<Vcon>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("list_by_ids", e))?;
        let mut vcons = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            if let Some(vcon) = fetch_full(&mut conn, uuid).await? {
                vcons.push(vcon);
            }
        }
        Ok(vcons)
    }

    async fn metadata(&self, uuid: &Uuid) -> Result<Option<VconMetadata>> {
        let row = sqlx::query(
            "SELECT uuid, subject, created_at, updated_at, tenant_id FROM vcons WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("metadata", e))?;
        row.as_ref().map(rows::row_to_metadata).transpose()
    }

    async fn shape(&self) -> Result<DatabaseShape> {
        let mut tables = BTreeMap::new();
        for table in [
            "vcons",
            "parties",
            "dialogs",
            "analyses",
            "attachments",
            "vcon_groups",
            "vcon_embeddings",
            "embedding_tasks",
        ] {
            let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("shape", e))?;
            let n: i64 = row.try_get("n").map_err(|e| map_sqlx_error("shape", e))?;
            tables.insert(table.to_owned(), n);
        }

        let row = sqlx::query("SELECT relrowsecurity FROM pg_class WHERE relname = 'vcons'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("shape", e))?;
        let rls_enabled: bool = row
            .try_get("relrowsecurity")
            .map_err(|e| map_sqlx_error("shape", e))?;

        Ok(DatabaseShape {
            tables,
            rls_enabled,
        })
    }

    async fn stats(&self) -> Result<DatabaseStats> {
        let row = sqlx::query(
            r"
            SELECT
                (SELECT COUNT(*) FROM vcons)                                        AS vcons,
                (SELECT COUNT(*) FROM parties)                                      AS parties,
                (SELECT COUNT(*) FROM dialogs)                                      AS dialogs,
                (SELECT COUNT(*) FROM analyses)                                     AS analyses,
                (SELECT COUNT(*) FROM attachments)                                  AS attachments,
                (SELECT COUNT(*) FROM vcon_embeddings)                              AS embeddings,
                (SELECT COUNT(*) FROM embedding_tasks WHERE status = 'pending')     AS pending_tasks,
                (SELECT COUNT(*) FROM embedding_tasks WHERE status = 'failed')      AS failed_tasks,
                (SELECT COUNT(*) FROM vcon_tags t JOIN vcons v ON v.id = t.vcon_id) AS tagged
            ",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("stats", e))?;

        let n = |name: &str| -> Result<i64> {
            row.try_get(name).map_err(|e| map_sqlx_error("stats", e))
        };
        Ok(DatabaseStats {
            vcon_count: n("vcons")?,
            party_count: n("parties")?,
            dialog_count: n("dialogs")?,
            analysis_count: n("analyses")?,
            attachment_count: n("attachments")?,
            embedding_count: n("embeddings")?,
            pending_embedding_tasks: n("pending_tasks")?,
            failed_embedding_tasks: n("failed_tasks")?,
            tagged_vcon_count: n("tagged")?,
        })
    }
}

/// Hydrate the full container, children ordered by their indexes.
pub(crate) async fn fetch_full(conn: &mut PgConnection, uuid: &Uuid) -> Result<Option<Vcon>> {
    let row = sqlx::query("SELECT * FROM vcons WHERE uuid = $1")
        .bind(uuid)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;
    let Some(row) = row else {
        return Ok(None);
    };
    let vcon_id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("get", e))?;
    let mut vcon = rows::row_to_vcon_shell(&row)?;

    let party_rows = sqlx::query("SELECT * FROM parties WHERE vcon_id = $1 ORDER BY party_index")
        .bind(vcon_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;
    vcon.parties = party_rows.iter().map(rows::row_to_party).collect::<Result<_>>()?;

    let dialog_rows = sqlx::query("SELECT * FROM dialogs WHERE vcon_id = $1 ORDER BY dialog_index")
        .bind(vcon_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;
    for dialog_row in &dialog_rows {
        let dialog_id: i64 = dialog_row
            .try_get("id")
            .map_err(|e| map_sqlx_error("get", e))?;
        let mut dialog = rows::row_to_dialog(dialog_row)?;
        let events =
            sqlx::query("SELECT * FROM party_history WHERE dialog_id = $1 ORDER BY time")
                .bind(dialog_id)
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("get", e))?;
        if !events.is_empty() {
            dialog.party_history = Some(
                events
                    .iter()
                    .map(rows::row_to_party_history)
                    .collect::<Result<_>>()?,
            );
        }
        vcon.dialog.push(dialog);
    }

    let analysis_rows =
        sqlx::query("SELECT * FROM analyses WHERE vcon_id = $1 ORDER BY analysis_index")
            .bind(vcon_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
    vcon.analysis = analysis_rows
        .iter()
        .map(rows::row_to_analysis)
        .collect::<Result<_>>()?;

    let attachment_rows =
        sqlx::query("SELECT * FROM attachments WHERE vcon_id = $1 ORDER BY attachment_index")
            .bind(vcon_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
    vcon.attachments = attachment_rows
        .iter()
        .map(rows::row_to_attachment)
        .collect::<Result<_>>()?;

    let group_rows = sqlx::query("SELECT * FROM vcon_groups WHERE vcon_id = $1 ORDER BY group_index")
        .bind(vcon_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;
    if !group_rows.is_empty() {
        vcon.group = Some(
            group_rows
                .iter()
                .map(rows::row_to_group)
                .collect::<Result<_>>()?,
        );
    }

    Ok(Some(vcon))
}

/// Append the patch's children at the next dense indexes, validating index
/// references against the combined (existing + appended) array sizes.
async fn append_children(tx: &mut PgConnection, vcon_id: i64, patch: &VconUpdate) -> Result<()> {
    let counts = sqlx::query(
        r"
        SELECT
            (SELECT COUNT(*) FROM parties     WHERE vcon_id = $1) AS parties,
            (SELECT COUNT(*) FROM dialogs     WHERE vcon_id = $1) AS dialogs,
            (SELECT COUNT(*) FROM analyses    WHERE vcon_id = $1) AS analyses,
            (SELECT COUNT(*) FROM attachments WHERE vcon_id = $1) AS attachments,
            (SELECT COUNT(*) FROM vcon_groups WHERE vcon_id = $1) AS groups
        ",
    )
    .bind(vcon_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_sqlx_error("update", e))?;

    let count = |name: &str| -> Result<i64> {
        counts
            .try_get(name)
            .map_err(|e| map_sqlx_error("update", e))
    };
    let party_base = count("parties")?;
    let dialog_base = count("dialogs")?;
    let analysis_base = count("analyses")?;
    let attachment_base = count("attachments")?;
    let group_base = count("groups")?;

    let total_parties = party_base as usize + patch.new_parties.len();
    let total_dialogs = dialog_base as usize + patch.new_dialogs.len();

    for (i, party) in patch.new_parties.iter().enumerate() {
        insert_party(tx, vcon_id, party_base as i32 + i as i32, party).await?;
    }
    for (i, dialog) in patch.new_dialogs.iter().enumerate() {
        validate_dialog(dialog, total_parties)?;
        insert_dialog(tx, vcon_id, dialog_base as i32 + i as i32, dialog).await?;
    }
    for (i, analysis) in patch.new_analyses.iter().enumerate() {
        validate_analysis(analysis, total_dialogs)?;
        insert_analysis(tx, vcon_id, analysis_base as i32 + i as i32, analysis).await?;
    }
    for (i, attachment) in patch.new_attachments.iter().enumerate() {
        validate_attachment(attachment, total_parties, total_dialogs)?;
        insert_attachment(tx, vcon_id, attachment_base as i32 + i as i32, attachment).await?;
    }
    for (i, group) in patch.new_groups.iter().enumerate() {
        insert_group(tx, vcon_id, group_base as i32 + i as i32, group).await?;
    }
    Ok(())
}

async fn insert_party(
    conn: &mut PgConnection,
    vcon_id: i64,
    index: i32,
    party: &Party,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO parties (vcon_id, party_index, tel, sip, stir, mailto, name, did,
                             uuid, jcard, civicaddress, timezone)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ",
    )
    .bind(vcon_id)
    .bind(index)
    .bind(&party.tel)
    .bind(&party.sip)
    .bind(&party.stir)
    .bind(&party.mailto)
    .bind(&party.name)
    .bind(&party.did)
    .bind(&party.uuid)
    .bind(&party.jcard)
    .bind(&party.civicaddress)
    .bind(&party.timezone)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_party", e))?;
    Ok(())
}

async fn insert_dialog(
    conn: &mut PgConnection,
    vcon_id: i64,
    index: i32,
    dialog: &Dialog,
) -> Result<()> {
    let row = sqlx::query(
        r"
        INSERT INTO dialogs (vcon_id, dialog_index, type, start_time, duration_seconds,
                             parties, originator, mediatype, body, encoding, url,
                             content_hash, disposition, session_id, application, message_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id
        ",
    )
    .bind(vcon_id)
    .bind(index)
    .bind(dialog.dialog_type.as_str())
    .bind(dialog.start_time)
    .bind(dialog.duration)
    .bind(dialog.parties.as_ref().map(|p| serde_json::json!(p)))
    .bind(dialog.originator)
    .bind(&dialog.mediatype)
    .bind(&dialog.body)
    .bind(dialog.encoding.map(|e| e.as_str()))
    .bind(&dialog.url)
    .bind(&dialog.content_hash)
    .bind(dialog.disposition.map(|d| d.as_str()))
    .bind(&dialog.session_id)
    .bind(&dialog.application)
    .bind(&dialog.message_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_dialog", e))?;

    if let Some(history) = &dialog.party_history {
        let dialog_id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("insert_dialog", e))?;
        for event in history {
            sqlx::query(
                "INSERT INTO party_history (dialog_id, party_index, time, event) VALUES ($1, $2, $3, $4)",
            )
            .bind(dialog_id)
            .bind(event.party)
            .bind(event.time)
            .bind(event.event.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("insert_party_history", e))?;
        }
    }
    Ok(())
}

async fn insert_analysis(
    conn: &mut PgConnection,
    vcon_id: i64,
    index: i32,
    analysis: &Analysis,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO analyses (vcon_id, analysis_index, type, dialog_indices, vendor,
                              product, schema, body, encoding, url, content_hash)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(vcon_id)
    .bind(index)
    .bind(&analysis.analysis_type)
    .bind(analysis.dialog.as_ref().map(|d| serde_json::json!(d)))
    .bind(&analysis.vendor)
    .bind(&analysis.product)
    .bind(&analysis.schema)
    .bind(&analysis.body)
    .bind(analysis.encoding.map(|e| e.as_str()))
    .bind(&analysis.url)
    .bind(&analysis.content_hash)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_analysis", e))?;
    Ok(())
}

pub(crate) async fn insert_attachment(
    conn: &mut PgConnection,
    vcon_id: i64,
    index: i32,
    attachment: &Attachment,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO attachments (vcon_id, attachment_index, type, party, dialog,
                                 mimetype, body, encoding, url, content_hash, start_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(vcon_id)
    .bind(index)
    .bind(&attachment.attachment_type)
    .bind(attachment.party)
    .bind(attachment.dialog)
    .bind(&attachment.mimetype)
    .bind(&attachment.body)
    .bind(attachment.encoding.map(|e| e.as_str()))
    .bind(&attachment.url)
    .bind(&attachment.content_hash)
    .bind(attachment.start_time)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_attachment", e))?;
    Ok(())
}

async fn insert_group(
    conn: &mut PgConnection,
    vcon_id: i64,
    index: i32,
    group: &Group,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO vcon_groups (vcon_id, group_index, uuid, body, encoding, url)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(vcon_id)
    .bind(index)
    .bind(group.uuid)
    .bind(&group.body)
    .bind(&group.encoding)
    .bind(&group.url)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_group", e))?;
    Ok(())
}
