//! Tool response shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use vcon_application::use_cases::SearchPayload;
use vcon_domain::value_objects::{HybridHit, KeywordHit, SemanticHit};

#[derive(Debug, Serialize)]
pub struct CreateVconOutput {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteVconOutput {
    pub uuid: Uuid,
    pub deleted: bool,
}

/// Returned by the child appenders: the new array sizes after the append.
#[derive(Debug, Serialize)]
pub struct AppendOutput {
    pub uuid: Uuid,
    pub dialog_count: usize,
    pub analysis_count: usize,
    pub attachment_count: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AppendOutput {
    pub fn from_vcon(vcon: &vcon_domain::entities::Vcon) -> Self {
        Self {
            uuid: vcon.uuid,
            dialog_count: vcon.dialog.len(),
            analysis_count: vcon.analysis.len(),
            attachment_count: vcon.attachments.len(),
            updated_at: vcon.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct KeywordSearchOutput {
    pub total: usize,
    pub hits: Vec<KeywordHit>,
}

#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub total: usize,
    /// Hydrated per the requested response format.
    pub results: Value,
}

#[derive(Debug, Serialize)]
pub struct SemanticSearchOutput {
    pub total: usize,
    pub hits: Vec<SemanticHit>,
    pub results: Value,
}

#[derive(Debug, Serialize)]
pub struct HybridSearchOutput {
    pub total: usize,
    pub hits: Vec<HybridHit>,
    pub results: Value,
}

#[derive(Debug, Serialize)]
pub struct TagsOutput {
    pub uuid: Uuid,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct TagValueOutput {
    pub uuid: Uuid,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Render a search payload into the `results` field.
pub fn payload_json(payload: &SearchPayload) -> vcon_domain::error::Result<(usize, Value)> {
    Ok(match payload {
        SearchPayload::Full(vcons) => (vcons.len(), serde_json::to_value(vcons)?),
        SearchPayload::Metadata(metadata) => (metadata.len(), serde_json::to_value(metadata)?),
        SearchPayload::IdsOnly(ids) => (ids.len(), serde_json::to_value(ids)?),
    })
}
