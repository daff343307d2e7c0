//! Tool argument types.
//!
//! Each struct derives `JsonSchema`, which becomes the tool's declared
//! input schema; the dispatcher rejects non-conforming arguments before a
//! handler runs. Raw `serde_json::Value` is used where the payload needs
//! pre-deserialization checks (create documents, analysis input) so callers
//! get pointed validation messages instead of serde's.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use vcon_domain::entities::{Attachment, Dialog};
use vcon_domain::value_objects::{ResponseFormat, SearchFilters};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateVconRequest {
    /// Complete vCon document in the IETF JSON shape.
    pub vcon: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetVconRequest {
    pub uuid: Uuid,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateVconRequest {
    pub uuid: Uuid,
    /// Replacement subject.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub must_support: Option<Vec<String>>,
    #[serde(default)]
    pub redacted: Option<Value>,
    #[serde(default)]
    pub appended: Option<Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteVconRequest {
    pub uuid: Uuid,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddDialogRequest {
    pub uuid: Uuid,
    pub dialog: Dialog,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddAnalysisRequest {
    pub uuid: Uuid,
    /// Analysis object; validated before deserialization so mistakes like
    /// `schema_version` get a precise rejection.
    pub analysis: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddAttachmentRequest {
    pub uuid: Uuid,
    pub attachment: Attachment,
}

/// Filter fields shared by the search tools.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct FilterParams {
    /// Lower bound on creation time.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// Upper bound on creation time.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Tag filter, AND-semantics across keys.
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    /// Result limit (default 50, capped at 500).
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FilterParams {
    pub fn into_filters(self) -> SearchFilters {
        SearchFilters {
            start_date: self.start_date,
            end_date: self.end_date,
            tags: self.tags,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchVconsRequest {
    /// Keyword query; omit to browse by filters alone.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(flatten)]
    pub filters: FilterParams,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchContentRequest {
    /// Keyword query over subjects, parties, dialog and analysis bodies.
    pub query: String,
    #[serde(flatten)]
    pub filters: FilterParams,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SemanticSearchRequest {
    /// Query text, vectorized by the embedding provider.
    #[serde(default)]
    pub query: Option<String>,
    /// Pre-computed 384-dimensional query vector.
    #[serde(default)]
    pub query_vector: Option<Vec<f32>>,
    /// Minimum cosine similarity (default 0.7).
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(flatten)]
    pub filters: FilterParams,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HybridSearchRequest {
    /// Keyword query (also vectorized when no query_vector is given).
    #[serde(default)]
    pub query: Option<String>,
    /// Pre-computed 384-dimensional query vector.
    #[serde(default)]
    pub query_vector: Option<Vec<f32>>,
    /// Weight of the semantic score in [0, 1] (default 0.6).
    #[serde(default)]
    pub semantic_weight: Option<f64>,
    #[serde(flatten)]
    pub filters: FilterParams,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Action selector for `manage_tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagAction {
    Get,
    Set,
    Remove,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ManageTagRequest {
    pub uuid: Uuid,
    pub action: TagAction,
    /// Tag key; required for every action.
    pub key: String,
    /// Tag value; required for `set`. Numbers and booleans are
    /// stringified.
    #[serde(default)]
    pub value: Option<Value>,
    /// Whether `set` may replace an existing key (default true).
    #[serde(default)]
    pub overwrite: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTagsRequest {
    pub uuid: Uuid,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RemoveAllTagsRequest {
    pub uuid: Uuid,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchByTagsRequest {
    /// Tags that must all be present (AND-semantics).
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct UniqueTagsRequest {
    /// Include per-value occurrence counts.
    #[serde(default)]
    pub include_counts: bool,
    /// Restrict the report to one key.
    #[serde(default)]
    pub key_filter: Option<String>,
    /// Drop values appearing fewer times than this.
    #[serde(default)]
    pub min_count: Option<i64>,
}
