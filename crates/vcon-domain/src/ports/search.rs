//! Retrieval ports: keyword/semantic search and the tag subsystem.

use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::value_objects::{
    KeywordHit, SearchFilters, SemanticHit, UniqueTagsOptions, UniqueTagsReport,
};

/// Ranked retrieval over the normalized store.
///
/// Hybrid search is not a port method: the application layer composes it
/// from one keyword and one semantic pass.
#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Full-text search over subject, parties, dialog and analysis bodies,
    /// with trigram fallback for typo tolerance.
    async fn keyword(&self, query: &str, filters: &SearchFilters) -> Result<Vec<KeywordHit>>;

    /// Cosine-similarity search over stored content vectors.
    async fn semantic(
        &self,
        vector: &[f32],
        threshold: f32,
        filters: &SearchFilters,
    ) -> Result<Vec<SemanticHit>>;
}

/// Tag subsystem backed by the `tags` attachment and its materialized view.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Current tag map of a vCon. Fails with `NotFound` for unknown uuids.
    async fn get_tags(&self, uuid: &Uuid) -> Result<BTreeMap<String, String>>;

    /// Replace the vCon's tag attachment with the given map, bumping
    /// `updated_at` and refreshing the materialized view.
    async fn put_tags(&self, uuid: &Uuid, tags: &BTreeMap<String, String>) -> Result<()>;

    /// UUIDs whose tag set contains every supplied pair (AND-semantics).
    async fn search_by_tags(
        &self,
        tags: &BTreeMap<String, String>,
        limit: usize,
    ) -> Result<Vec<Uuid>>;

    /// Distinct keys and values across all tagged vCons.
    async fn unique_tags(&self, options: &UniqueTagsOptions) -> Result<UniqueTagsReport>;
}
