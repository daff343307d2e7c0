//! Search inputs and result shapes for the four retrieval modes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};

/// Which retrieval mode a criteria bundle targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
    Tag,
}

/// Payload size control shared by every search tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Hydrated vCons.
    Full,
    /// `{uuid, subject, created_at, updated_at, tenant_id}` per hit.
    #[default]
    Metadata,
    /// Bare UUID list.
    IdsOnly,
}

/// Common filter bundle accepted by every search mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchFilters {
    /// Lower bound on `created_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    /// Upper bound on `created_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Tag filter, AND-semantics across keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    /// Result limit; defaults to 50, capped at 500.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl SearchFilters {
    /// Effective limit after applying the default and the cap.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .min(MAX_SEARCH_LIMIT)
    }
}

/// Full criteria handed to `beforeSearch` hooks, which may mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub mode: SearchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub filters: SearchFilters,
}

/// Which document a keyword hit matched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Subject,
    Party,
    Dialog,
    Analysis,
}

impl DocType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Party => "party",
            Self::Dialog => "dialog",
            Self::Analysis => "analysis",
        }
    }
}

impl std::str::FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subject" => Ok(Self::Subject),
            "party" => Ok(Self::Party),
            "dialog" => Ok(Self::Dialog),
            "analysis" => Ok(Self::Analysis),
            _ => Err(format!("Unknown doc type: {s}")),
        }
    }
}

/// One full-text or trigram match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordHit {
    pub vcon_uuid: Uuid,
    pub doc_type: DocType,
    /// Child index for dialog/analysis/party hits; absent for subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_index: Option<i32>,
    pub rank: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// One cosine-similarity match against stored embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticHit {
    pub vcon_uuid: Uuid,
    pub content_type: crate::entities::EmbeddingContentType,
    pub content_reference: String,
    pub content_text: String,
    /// Cosine similarity in [0, 1].
    pub similarity: f32,
}

/// Combined keyword + semantic score for one vCon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridHit {
    pub vcon_uuid: Uuid,
    pub combined_score: f64,
    pub semantic_score: f64,
    pub keyword_score: f64,
}

/// The `metadata` response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VconMetadata {
    pub uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Options for the unique-tags report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UniqueTagsOptions {
    /// Also count occurrences per value.
    #[serde(default)]
    pub include_counts: bool,
    /// Restrict the report to one key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_filter: Option<String>,
    /// Drop values appearing fewer times than this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_count: Option<i64>,
}

/// Distinct tag keys and values across the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueTagsReport {
    pub keys: Vec<String>,
    pub tags_by_key: BTreeMap<String, Vec<String>>,
    /// Per-value occurrence counts, present when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts_per_value: Option<BTreeMap<String, BTreeMap<String, i64>>>,
}
