//! Four-mode retrieval orchestration.
//!
//! Keyword and semantic passes run in the provider; hybrid combination and
//! response shaping happen here. Per-vCon scores are the max across that
//! vCon's hits; keyword ranks are normalized by the result-set maximum so
//! both sub-scores live in [0, 1] before weighting. Raising either raw
//! sub-score can only raise the combined score.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use vcon_domain::constants::{DEFAULT_SEMANTIC_WEIGHT, DEFAULT_SIMILARITY_THRESHOLD};
use vcon_domain::entities::Vcon;
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::{EmbeddingProvider, SearchRepository, TagRepository, VconRepository};
use vcon_domain::value_objects::{
    HybridHit, KeywordHit, RequestContext, ResponseFormat, SearchCriteria, SearchFilters,
    SearchMode, SemanticHit, UniqueTagsOptions, UniqueTagsReport, VconMetadata,
};

use crate::plugins::PluginManager;

/// A semantic query: either pre-vectorized or routed to the embedding
/// provider.
#[derive(Debug, Clone)]
pub enum SemanticQuery {
    Text(String),
    Vector(Vec<f32>),
}

/// Response payload in the caller-chosen format.
#[derive(Debug, Clone)]
pub enum SearchPayload {
    Full(Vec<Vcon>),
    Metadata(Vec<VconMetadata>),
    IdsOnly(Vec<Uuid>),
}

/// Retrieval service over the search, tag and repository ports.
pub struct SearchService {
    repository: Arc<dyn VconRepository>,
    search: Arc<dyn SearchRepository>,
    tags: Arc<dyn TagRepository>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    plugins: Arc<PluginManager>,
}

impl SearchService {
    pub fn new(
        repository: Arc<dyn VconRepository>,
        search: Arc<dyn SearchRepository>,
        tags: Arc<dyn TagRepository>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        plugins: Arc<PluginManager>,
    ) -> Self {
        Self {
            repository,
            search,
            tags,
            embedder,
            plugins,
        }
    }

    /// Full-text search over subjects, parties, dialog and analysis bodies.
    pub async fn keyword(
        &self,
        query: &str,
        filters: SearchFilters,
        ctx: &RequestContext,
    ) -> Result<Vec<KeywordHit>> {
        let criteria = self
            .plugins
            .before_search(
                SearchCriteria {
                    mode: SearchMode::Keyword,
                    query: Some(query.to_owned()),
                    filters,
                },
                ctx,
            )
            .await?;
        let query = criteria.query.as_deref().unwrap_or(query);
        if query.trim().is_empty() {
            return Err(Error::validation("query", "must be non-empty"));
        }
        self.search.keyword(query, &criteria.filters).await
    }

    /// Cosine-similarity search over stored embeddings.
    ///
    /// Content written but not yet processed by the embedding worker is
    /// simply absent; results are eventually consistent with writes.
    pub async fn semantic(
        &self,
        query: SemanticQuery,
        threshold: Option<f32>,
        filters: SearchFilters,
        ctx: &RequestContext,
    ) -> Result<Vec<SemanticHit>> {
        let criteria = self
            .plugins
            .before_search(
                SearchCriteria {
                    mode: SearchMode::Semantic,
                    query: match &query {
                        SemanticQuery::Text(t) => Some(t.clone()),
                        SemanticQuery::Vector(_) => None,
                    },
                    filters,
                },
                ctx,
            )
            .await?;

        let vector = self.resolve_vector(query).await?;
        let threshold = threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        self.search
            .semantic(&vector, threshold, &criteria.filters)
            .await
    }

    /// Weighted combination of one keyword and one semantic pass.
    ///
    /// When one input is missing the engine degrades to the other mode's
    /// ranking alone.
    pub async fn hybrid(
        &self,
        query: Option<String>,
        vector: Option<Vec<f32>>,
        semantic_weight: Option<f64>,
        filters: SearchFilters,
        ctx: &RequestContext,
    ) -> Result<Vec<HybridHit>> {
        let criteria = self
            .plugins
            .before_search(
                SearchCriteria {
                    mode: SearchMode::Hybrid,
                    query: query.clone(),
                    filters,
                },
                ctx,
            )
            .await?;
        let query = criteria.query.or(query);
        let weight = semantic_weight
            .unwrap_or(DEFAULT_SEMANTIC_WEIGHT)
            .clamp(0.0, 1.0);

        let keyword_hits = match query.as_deref().filter(|q| !q.trim().is_empty()) {
            Some(q) => self.search.keyword(q, &criteria.filters).await?,
            None => Vec::new(),
        };

        let semantic_hits = match (vector, &query) {
            (Some(v), _) => {
                self.search
                    // Hybrid keeps every similarity and lets the weight decide.
                    .semantic(&v, 0.0, &criteria.filters)
                    .await?
            }
            (None, Some(q)) if self.embedder.is_some() => {
                let v = self.resolve_vector(SemanticQuery::Text(q.clone())).await?;
                self.search.semantic(&v, 0.0, &criteria.filters).await?
            }
            _ => Vec::new(),
        };

        if keyword_hits.is_empty() && semantic_hits.is_empty() {
            return Ok(Vec::new());
        }

        let limit = criteria.filters.effective_limit();
        Ok(combine_hybrid(keyword_hits, semantic_hits, weight, limit))
    }

    /// Containment search over the tag materialized view.
    pub async fn by_tags(
        &self,
        tags: BTreeMap<String, String>,
        filters: SearchFilters,
        ctx: &RequestContext,
    ) -> Result<Vec<Uuid>> {
        if tags.is_empty() {
            return Err(Error::validation("tags", "at least one tag is required"));
        }
        let criteria = self
            .plugins
            .before_search(
                SearchCriteria {
                    mode: SearchMode::Tag,
                    query: None,
                    filters: SearchFilters {
                        tags: Some(tags),
                        ..filters
                    },
                },
                ctx,
            )
            .await?;
        let tags = criteria.filters.tags.clone().unwrap_or_default();
        self.tags
            .search_by_tags(&tags, criteria.filters.effective_limit())
            .await
    }

    /// Distinct tag keys and values across the store.
    pub async fn unique_tags(&self, options: &UniqueTagsOptions) -> Result<UniqueTagsReport> {
        self.tags.unique_tags(options).await
    }

    /// Hydrate an ordered uuid list into the caller-chosen format, running
    /// the `afterSearch` observers on the metadata in between. Plugins may
    /// filter, and the surviving set drives every format.
    pub async fn finalize(
        &self,
        uuids: Vec<Uuid>,
        format: ResponseFormat,
        ctx: &RequestContext,
    ) -> Result<SearchPayload> {
        let mut metadata = Vec::with_capacity(uuids.len());
        for uuid in &uuids {
            if let Some(meta) = self.repository.metadata(uuid).await? {
                metadata.push(meta);
            }
        }
        let metadata = self.plugins.after_search(metadata, ctx).await;

        match format {
            ResponseFormat::Metadata => Ok(SearchPayload::Metadata(metadata)),
            ResponseFormat::IdsOnly => {
                Ok(SearchPayload::IdsOnly(metadata.into_iter().map(|m| m.uuid).collect()))
            }
            ResponseFormat::Full => {
                let ids: Vec<Uuid> = metadata.iter().map(|m| m.uuid).collect();
                let mut vcons = self.repository.list_by_ids(&ids).await?;
                // Preserve ranking order.
                vcons.sort_by_key(|v| ids.iter().position(|id| *id == v.uuid));
                Ok(SearchPayload::Full(vcons))
            }
        }
    }

    async fn resolve_vector(&self, query: SemanticQuery) -> Result<Vec<f32>> {
        match query {
            SemanticQuery::Vector(v) => Ok(v),
            SemanticQuery::Text(text) => {
                let embedder = self.embedder.as_ref().ok_or_else(|| {
                    Error::validation(
                        "query",
                        "no embedding provider configured; supply a query vector",
                    )
                })?;
                let embedding = embedder.embed(&text).await?;
                debug!(model = %embedding.model, "query vectorized");
                Ok(embedding.vector)
            }
        }
    }
}

/// Combine per-vCon keyword and semantic maxima into one ranking.
fn combine_hybrid(
    keyword_hits: Vec<KeywordHit>,
    semantic_hits: Vec<SemanticHit>,
    semantic_weight: f64,
    limit: usize,
) -> Vec<HybridHit> {
    let max_rank = keyword_hits
        .iter()
        .map(|h| h.rank)
        .fold(0.0f32, f32::max)
        .max(f32::EPSILON);

    let mut keyword_by_vcon: BTreeMap<Uuid, f64> = BTreeMap::new();
    for hit in keyword_hits {
        let normalized = f64::from(hit.rank / max_rank);
        let entry = keyword_by_vcon.entry(hit.vcon_uuid).or_default();
        *entry = entry.max(normalized);
    }

    let mut semantic_by_vcon: BTreeMap<Uuid, f64> = BTreeMap::new();
    for hit in semantic_hits {
        let entry = semantic_by_vcon.entry(hit.vcon_uuid).or_default();
        *entry = entry.max(f64::from(hit.similarity));
    }

    let mut combined: Vec<HybridHit> = keyword_by_vcon
        .keys()
        .chain(semantic_by_vcon.keys())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .map(|uuid| {
            let keyword_score = keyword_by_vcon.get(uuid).copied().unwrap_or(0.0);
            let semantic_score = semantic_by_vcon.get(uuid).copied().unwrap_or(0.0);
            HybridHit {
                vcon_uuid: *uuid,
                combined_score: semantic_weight * semantic_score
                    + (1.0 - semantic_weight) * keyword_score,
                semantic_score,
                keyword_score,
            }
        })
        .collect();

    combined.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.vcon_uuid.cmp(&b.vcon_uuid))
    });
    combined.truncate(limit);
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcon_domain::value_objects::DocType;

    fn kw(uuid: Uuid, rank: f32) -> KeywordHit {
        KeywordHit {
            vcon_uuid: uuid,
            doc_type: DocType::Subject,
            ref_index: None,
            rank,
            snippet: None,
        }
    }

    fn sem(uuid: Uuid, similarity: f32) -> SemanticHit {
        SemanticHit {
            vcon_uuid: uuid,
            content_type: vcon_domain::entities::EmbeddingContentType::Subject,
            content_reference: "subject".to_owned(),
            content_text: String::new(),
            similarity,
        }
    }

    #[test]
    fn weights_default_toward_semantic() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let hits = combine_hybrid(
            vec![kw(a, 1.0)],
            vec![sem(b, 0.9)],
            DEFAULT_SEMANTIC_WEIGHT,
            50,
        );
        assert_eq!(hits[0].vcon_uuid, b);
        assert!(hits[0].combined_score > hits[1].combined_score);
    }

    #[test]
    fn raising_a_sub_score_never_lowers_the_combined() {
        let a = Uuid::new_v4();
        let low = combine_hybrid(vec![kw(a, 0.4)], vec![sem(a, 0.5)], 0.6, 50);
        let high = combine_hybrid(vec![kw(a, 0.4)], vec![sem(a, 0.8)], 0.6, 50);
        assert!(high[0].combined_score >= low[0].combined_score);
    }

    #[test]
    fn keyword_scores_normalize_by_result_set_max() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let hits = combine_hybrid(vec![kw(a, 2.0), kw(b, 1.0)], Vec::new(), 0.0, 50);
        let top = hits.iter().find(|h| h.vcon_uuid == a).unwrap();
        let bottom = hits.iter().find(|h| h.vcon_uuid == b).unwrap();
        assert!((top.keyword_score - 1.0).abs() < 1e-9);
        assert!((bottom.keyword_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn per_vcon_score_is_the_max_across_hits() {
        let a = Uuid::new_v4();
        let hits = combine_hybrid(vec![kw(a, 0.2), kw(a, 0.9)], Vec::new(), 0.0, 50);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].keyword_score - 1.0).abs() < 1e-9);
    }
}
