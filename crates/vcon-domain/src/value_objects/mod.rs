//! Immutable value objects shared across layers.

/// Request context and cancellation
pub mod context;
/// Search inputs and results
pub mod search;
/// Update patches and batch reports
pub mod update;

use serde::{Deserialize, Serialize};

pub use context::RequestContext;
pub use search::{
    DocType, HybridHit, KeywordHit, ResponseFormat, SearchCriteria, SearchFilters, SearchMode,
    SemanticHit, UniqueTagsOptions, UniqueTagsReport, VconMetadata,
};
pub use update::{BatchItemOutcome, BatchReport, VconUpdate};

/// A content vector with its producing model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
}

/// Database shape report for introspection tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseShape {
    /// Table name -> row count.
    pub tables: std::collections::BTreeMap<String, i64>,
    /// Whether row-level security is enabled on `vcons`.
    pub rls_enabled: bool,
}

/// Aggregate store statistics for introspection tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub vcon_count: i64,
    pub party_count: i64,
    pub dialog_count: i64,
    pub analysis_count: i64,
    pub attachment_count: i64,
    pub embedding_count: i64,
    pub pending_embedding_tasks: i64,
    pub failed_embedding_tasks: i64,
    pub tagged_vcon_count: i64,
}

/// Diagnostic report from [`crate::ports::TenantContext::verify_tenant_context`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantContextReport {
    /// Tenant the process was configured with.
    pub expected: Option<String>,
    /// Tenant the database session actually reports.
    pub actual: Option<String>,
    /// Whether the two agree.
    pub matches: bool,
}
