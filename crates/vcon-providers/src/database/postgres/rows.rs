//! Row-to-entity conversions.

use sqlx::Row;
use sqlx::postgres::PgRow;

use vcon_domain::entities::{
    Analysis, Attachment, Dialog, EmbeddingTask, Group, Party, PartyHistory,
};
use vcon_domain::error::{Error, Result};
use vcon_domain::value_objects::VconMetadata;

/// Render a vector as the pgvector text literal (`[1,2,3]`), bound as
/// `$n::vector`.
pub(crate) fn vector_literal(vector: &[f32]) -> String {
    let joined = vector
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("[{joined}]")
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| Error::storage_with_source(format!("decode column '{column}'"), false, e))
}

/// Parse an optional enum column via its `FromStr`.
fn parse_enum<E>(value: Option<String>, column: &str) -> Result<Option<E>>
where
    E: std::str::FromStr<Err = String>,
{
    value
        .map(|s| {
            s.parse::<E>()
                .map_err(|e| Error::storage(format!("column '{column}': {e}")))
        })
        .transpose()
}

/// JSONB int array -> Vec<i32>.
fn indices(value: Option<serde_json::Value>, column: &str) -> Result<Option<Vec<i32>>> {
    value
        .map(|v| {
            serde_json::from_value(v)
                .map_err(|e| Error::storage(format!("column '{column}': {e}")))
        })
        .transpose()
}

/// String array stored as JSONB -> Vec<String>.
fn string_array(value: Option<serde_json::Value>, column: &str) -> Result<Option<Vec<String>>> {
    value
        .map(|v| {
            serde_json::from_value(v)
                .map_err(|e| Error::storage(format!("column '{column}': {e}")))
        })
        .transpose()
}

pub(crate) fn row_to_metadata(row: &PgRow) -> Result<VconMetadata> {
    Ok(VconMetadata {
        uuid: get(row, "uuid")?,
        subject: get(row, "subject")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        tenant_id: get(row, "tenant_id")?,
    })
}

/// Container scalars; children are hydrated separately.
pub(crate) fn row_to_vcon_shell(row: &PgRow) -> Result<vcon_domain::entities::Vcon> {
    let mut vcon = vcon_domain::entities::Vcon::with_uuid(get(row, "uuid")?);
    vcon.version = get(row, "vcon_version")?;
    vcon.subject = get(row, "subject")?;
    vcon.created_at = Some(get(row, "created_at")?);
    vcon.updated_at = Some(get(row, "updated_at")?);
    vcon.extensions = string_array(get(row, "extensions")?, "extensions")?;
    vcon.must_support = string_array(get(row, "must_support")?, "must_support")?;
    vcon.redacted = get(row, "redacted")?;
    vcon.appended = get(row, "appended")?;
    Ok(vcon)
}

pub(crate) fn row_to_party(row: &PgRow) -> Result<Party> {
    Ok(Party {
        tel: get(row, "tel")?,
        sip: get(row, "sip")?,
        stir: get(row, "stir")?,
        mailto: get(row, "mailto")?,
        name: get(row, "name")?,
        did: get(row, "did")?,
        uuid: get(row, "uuid")?,
        jcard: get(row, "jcard")?,
        civicaddress: get(row, "civicaddress")?,
        timezone: get(row, "timezone")?,
    })
}

pub(crate) fn row_to_dialog(row: &PgRow) -> Result<Dialog> {
    Ok(Dialog {
        dialog_type: get::<String>(row, "type")?
            .parse()
            .map_err(|e: String| Error::storage(format!("column 'type': {e}")))?,
        start_time: get(row, "start_time")?,
        duration: get(row, "duration_seconds")?,
        parties: indices(get(row, "parties")?, "parties")?,
        originator: get(row, "originator")?,
        mediatype: get(row, "mediatype")?,
        body: get(row, "body")?,
        encoding: parse_enum(get(row, "encoding")?, "encoding")?,
        url: get(row, "url")?,
        content_hash: get(row, "content_hash")?,
        disposition: parse_enum(get(row, "disposition")?, "disposition")?,
        session_id: get(row, "session_id")?,
        application: get(row, "application")?,
        message_id: get(row, "message_id")?,
        party_history: None,
    })
}

pub(crate) fn row_to_party_history(row: &PgRow) -> Result<PartyHistory> {
    Ok(PartyHistory {
        party: get(row, "party_index")?,
        time: get(row, "time")?,
        event: get::<String>(row, "event")?
            .parse()
            .map_err(|e: String| Error::storage(format!("column 'event': {e}")))?,
    })
}

pub(crate) fn row_to_analysis(row: &PgRow) -> Result<Analysis> {
    Ok(Analysis {
        analysis_type: get(row, "type")?,
        dialog: indices(get(row, "dialog_indices")?, "dialog_indices")?,
        vendor: get(row, "vendor")?,
        product: get(row, "product")?,
        schema: get(row, "schema")?,
        body: get(row, "body")?,
        encoding: parse_enum(get(row, "encoding")?, "encoding")?,
        url: get(row, "url")?,
        content_hash: get(row, "content_hash")?,
    })
}

pub(crate) fn row_to_attachment(row: &PgRow) -> Result<Attachment> {
    Ok(Attachment {
        attachment_type: get(row, "type")?,
        party: get(row, "party")?,
        dialog: get(row, "dialog")?,
        mimetype: get(row, "mimetype")?,
        body: get(row, "body")?,
        encoding: parse_enum(get(row, "encoding")?, "encoding")?,
        url: get(row, "url")?,
        content_hash: get(row, "content_hash")?,
        start_time: get(row, "start_time")?,
    })
}

pub(crate) fn row_to_group(row: &PgRow) -> Result<Group> {
    Ok(Group {
        uuid: get(row, "uuid")?,
        body: get(row, "body")?,
        encoding: get(row, "encoding")?,
        url: get(row, "url")?,
    })
}

pub(crate) fn row_to_task(row: &PgRow) -> Result<EmbeddingTask> {
    Ok(EmbeddingTask {
        id: get(row, "id")?,
        vcon_uuid: get(row, "vcon_uuid")?,
        content_type: get::<String>(row, "content_type")?
            .parse()
            .map_err(|e: String| Error::storage(format!("column 'content_type': {e}")))?,
        content_reference: get(row, "content_reference")?,
        content_text: get(row, "content_text")?,
        status: get::<String>(row, "status")?
            .parse()
            .map_err(|e: String| Error::storage(format!("column 'status': {e}")))?,
        retry_count: get(row, "retry_count")?,
        created_at: get(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::vector_literal;

    #[test]
    fn vector_literal_is_bracketed_and_comma_joined() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.0]), "[0.5,-1,2]");
        assert_eq!(vector_literal(&[]), "[]");
    }
}
