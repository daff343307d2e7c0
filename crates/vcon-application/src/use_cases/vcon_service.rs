//! vCon lifecycle service.
//!
//! Orchestrates one write or read end to end: hook pipeline, validation,
//! tenant derivation, the repository transaction, cache maintenance and
//! embedding enqueue. The cache is invalidated before a write is
//! acknowledged (strong invalidation), and enqueue failures never fail the
//! originating write.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use vcon_domain::constants::{CACHE_KEY_PREFIX, DEFAULT_CACHE_TTL_SECS};
use vcon_domain::entities::{
    Analysis, Attachment, Dialog, Group, Vcon, embedding_candidates, encoding_is_textual,
};
use vcon_domain::entities::{EmbeddingContentType, NewEmbeddingTask};
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::cache::CacheEntryConfig;
use vcon_domain::ports::{CacheProvider, EmbeddingQueue, VconRepository};
use vcon_domain::tenant::{TenantExtraction, extract_tenant_id};
use vcon_domain::validation::{validate_analysis, validate_attachment, validate_vcon};
use vcon_domain::value_objects::{
    BatchItemOutcome, BatchReport, DatabaseShape, DatabaseStats, RequestContext, VconMetadata,
    VconUpdate,
};

use crate::plugins::PluginManager;
use crate::retry::with_storage_retries;

/// CRUD orchestration over the injected ports.
pub struct VconService {
    repository: Arc<dyn VconRepository>,
    queue: Arc<dyn EmbeddingQueue>,
    plugins: Arc<PluginManager>,
    cache: Option<Arc<dyn CacheProvider>>,
    cache_ttl: Duration,
    tenant_extraction: TenantExtraction,
}

impl VconService {
    pub fn new(
        repository: Arc<dyn VconRepository>,
        queue: Arc<dyn EmbeddingQueue>,
        plugins: Arc<PluginManager>,
        cache: Option<Arc<dyn CacheProvider>>,
    ) -> Self {
        Self {
            repository,
            queue,
            plugins,
            cache,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            tenant_extraction: TenantExtraction::default(),
        }
    }

    /// Override the cache TTL (seconds from configuration).
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Override how tenant ids are extracted from documents.
    #[must_use]
    pub fn with_tenant_extraction(mut self, extraction: TenantExtraction) -> Self {
        self.tenant_extraction = extraction;
        self
    }

    /// Create a new vCon.
    ///
    /// Hook order: `beforeCreate` pipeline, validation, tenant derivation,
    /// the insert transaction, cache invalidation, embedding enqueue,
    /// `afterCreate` observers.
    pub async fn create(&self, vcon: Vcon, ctx: &RequestContext) -> Result<VconMetadata> {
        let vcon = self.plugins.before_create(vcon, ctx).await?;
        validate_vcon(&vcon)?;
        let tenant_id = extract_tenant_id(&vcon, &self.tenant_extraction)?;

        let metadata = with_storage_retries("create_vcon", || {
            let vcon = &vcon;
            let tenant = tenant_id.as_deref();
            async move { self.repository.create(vcon, tenant).await }
        })
        .await?;

        self.invalidate_cache(&vcon.uuid).await;
        self.enqueue_embeddings(embedding_candidates(&vcon)).await;
        self.plugins.after_create(&vcon, ctx).await;

        debug!(uuid = %vcon.uuid, tenant = ?tenant_id, "vCon created");
        Ok(metadata)
    }

    /// Create many vCons, best effort: items fail independently and prior
    /// successes are never rolled back.
    pub async fn create_batch(&self, vcons: Vec<Vcon>, ctx: &RequestContext) -> BatchReport {
        let mut items = Vec::with_capacity(vcons.len());
        let (mut succeeded, mut failed) = (0usize, 0usize);
        for vcon in vcons {
            let uuid = vcon.uuid;
            match self.create(vcon, ctx).await {
                Ok(_) => {
                    succeeded += 1;
                    items.push(BatchItemOutcome {
                        uuid,
                        created: true,
                        error: None,
                    });
                }
                Err(e) => {
                    failed += 1;
                    items.push(BatchItemOutcome {
                        uuid,
                        created: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        BatchReport {
            succeeded,
            failed,
            items,
        }
    }

    /// Fetch one vCon, consulting the cache first.
    pub async fn get(&self, uuid: &Uuid, ctx: &RequestContext) -> Result<Vcon> {
        self.plugins.before_read(uuid, ctx).await?;

        if let Some(vcon) = self.cache_get(uuid).await {
            return Ok(self.plugins.after_read(vcon, ctx).await);
        }

        let vcon = with_storage_retries("get_vcon", || async {
            self.repository.get(uuid).await
        })
        .await?
        .ok_or_else(|| Error::not_found(format!("vCon {uuid}")))?;

        self.cache_put(&vcon).await;
        Ok(self.plugins.after_read(vcon, ctx).await)
    }

    /// Apply a patch to an existing vCon.
    pub async fn update(
        &self,
        uuid: &Uuid,
        patch: VconUpdate,
        ctx: &RequestContext,
    ) -> Result<Vcon> {
        let patch = self.plugins.before_update(uuid, patch, ctx).await?;
        validate_patch(&patch)?;

        let updated = with_storage_retries("update_vcon", || {
            let patch = &patch;
            async move { self.repository.update(uuid, patch).await }
        })
        .await?;

        // Invalidate before acknowledging so a post-commit read never sees
        // the pre-update state.
        self.invalidate_cache(uuid).await;
        self.enqueue_embeddings(new_content_candidates(&updated, &patch))
            .await;
        self.plugins.after_update(&updated, ctx).await;
        Ok(updated)
    }

    /// Append a single dialog segment.
    pub async fn add_dialog(&self, uuid: &Uuid, dialog: Dialog, ctx: &RequestContext) -> Result<Vcon> {
        self.update(
            uuid,
            VconUpdate {
                new_dialogs: vec![dialog],
                ..VconUpdate::default()
            },
            ctx,
        )
        .await
    }

    /// Append a single analysis.
    pub async fn add_analysis(
        &self,
        uuid: &Uuid,
        analysis: Analysis,
        ctx: &RequestContext,
    ) -> Result<Vcon> {
        self.update(
            uuid,
            VconUpdate {
                new_analyses: vec![analysis],
                ..VconUpdate::default()
            },
            ctx,
        )
        .await
    }

    /// Append a single attachment.
    pub async fn add_attachment(
        &self,
        uuid: &Uuid,
        attachment: Attachment,
        ctx: &RequestContext,
    ) -> Result<Vcon> {
        self.update(
            uuid,
            VconUpdate {
                new_attachments: vec![attachment],
                ..VconUpdate::default()
            },
            ctx,
        )
        .await
    }

    /// Append a group reference to another vCon.
    pub async fn add_group(&self, uuid: &Uuid, group: Group, ctx: &RequestContext) -> Result<Vcon> {
        self.update(
            uuid,
            VconUpdate {
                new_groups: vec![group],
                ..VconUpdate::default()
            },
            ctx,
        )
        .await
    }

    /// Delete a vCon and everything it owns. Unknown uuids are `NotFound`,
    /// which makes a second delete of the same uuid fail the same way.
    pub async fn delete(&self, uuid: &Uuid, ctx: &RequestContext) -> Result<()> {
        self.plugins.before_delete(uuid, ctx).await?;

        let deleted = with_storage_retries("delete_vcon", || async {
            self.repository.delete(uuid).await
        })
        .await?;
        if !deleted {
            return Err(Error::not_found(format!("vCon {uuid}")));
        }

        self.invalidate_cache(uuid).await;
        if let Err(e) = self.queue.purge(uuid).await {
            warn!(uuid = %uuid, error = %e, "failed to purge embedding tasks");
        }
        self.plugins.after_delete(uuid, ctx).await;
        Ok(())
    }

    /// Most recently updated vCons (resource browsing).
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<VconMetadata>> {
        self.repository.list_recent(limit).await
    }

    /// Hydrate a specific id set.
    pub async fn list_by_ids(&self, uuids: &[Uuid]) -> Result<Vec<Vcon>> {
        self.repository.list_by_ids(uuids).await
    }

    /// Metadata-only lookup.
    pub async fn metadata(&self, uuid: &Uuid) -> Result<Option<VconMetadata>> {
        self.repository.metadata(uuid).await
    }

    /// Table shape report.
    pub async fn shape(&self) -> Result<DatabaseShape> {
        self.repository.shape().await
    }

    /// Aggregate statistics.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        self.repository.stats().await
    }

    async fn cache_get(&self, uuid: &Uuid) -> Option<Vcon> {
        let cache = self.cache.as_ref()?;
        let key = cache_key(uuid);
        match cache.get_json(&key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(vcon) => Some(vcon),
                Err(e) => {
                    warn!(uuid = %uuid, error = %e, "dropping undecodable cache entry");
                    let _ = cache.delete(&key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(uuid = %uuid, error = %e, "cache read failed, falling back to store");
                None
            }
        }
    }

    async fn cache_put(&self, vcon: &Vcon) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let Ok(json) = serde_json::to_string(vcon) else {
            return;
        };
        if let Err(e) = cache
            .set_json(
                &cache_key(&vcon.uuid),
                &json,
                CacheEntryConfig::with_ttl(self.cache_ttl),
            )
            .await
        {
            warn!(uuid = %vcon.uuid, error = %e, "cache write failed");
        }
    }

    async fn invalidate_cache(&self, uuid: &Uuid) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(e) = cache.delete(&cache_key(uuid)).await {
            warn!(uuid = %uuid, error = %e, "cache invalidation failed");
        }
    }

    async fn enqueue_embeddings(&self, tasks: Vec<NewEmbeddingTask>) {
        if tasks.is_empty() {
            return;
        }
        match self.queue.enqueue(&tasks).await {
            Ok(n) => debug!(enqueued = n, "embedding tasks enqueued"),
            Err(e) => warn!(error = %e, "failed to enqueue embedding tasks"),
        }
    }
}

fn cache_key(uuid: &Uuid) -> String {
    format!("{CACHE_KEY_PREFIX}{uuid}")
}

/// Self-contained checks on a patch; index references against existing
/// children are verified inside the repository transaction where the
/// current array lengths are known.
fn validate_patch(patch: &VconUpdate) -> Result<()> {
    if patch.is_empty() {
        return Err(Error::validation("patch", "no changes supplied"));
    }
    for (i, analysis) in patch.new_analyses.iter().enumerate() {
        validate_analysis(analysis, usize::MAX).map_err(|e| match e {
            Error::Validation { field, reason } => Error::Validation {
                field: format!("new_analyses[{i}].{field}"),
                reason,
            },
            other => other,
        })?;
    }
    for (i, attachment) in patch.new_attachments.iter().enumerate() {
        validate_attachment(attachment, usize::MAX, usize::MAX)
            .map_err(|e| match e {
                Error::Validation { field, reason } => Error::Validation {
                    field: format!("new_attachments[{i}].{field}"),
                    reason,
                },
                other => other,
            })?;
    }
    Ok(())
}

/// Embedding tasks for content a patch introduced: the subject when it
/// changed, plus the appended dialogs/analyses at their final indexes.
fn new_content_candidates(updated: &Vcon, patch: &VconUpdate) -> Vec<NewEmbeddingTask> {
    let mut tasks = Vec::new();

    if patch.subject.is_some()
        && let Some(subject) = updated.subject.as_deref()
        && !subject.trim().is_empty()
    {
        tasks.push(NewEmbeddingTask {
            vcon_uuid: updated.uuid,
            content_type: EmbeddingContentType::Subject,
            content_reference: "subject".to_owned(),
            content_text: subject.to_owned(),
        });
    }

    let first_new_dialog = updated.dialog.len().saturating_sub(patch.new_dialogs.len());
    for (i, dialog) in updated.dialog.iter().enumerate().skip(first_new_dialog) {
        if let Some(body) = dialog.body.as_deref()
            && encoding_is_textual(dialog.encoding)
            && !body.trim().is_empty()
        {
            tasks.push(NewEmbeddingTask {
                vcon_uuid: updated.uuid,
                content_type: EmbeddingContentType::Dialog,
                content_reference: format!("dialog_{i}"),
                content_text: body.to_owned(),
            });
        }
    }

    let first_new_analysis = updated
        .analysis
        .len()
        .saturating_sub(patch.new_analyses.len());
    for (i, analysis) in updated.analysis.iter().enumerate().skip(first_new_analysis) {
        if let Some(body) = analysis.body.as_deref()
            && encoding_is_textual(analysis.encoding)
            && !body.trim().is_empty()
        {
            tasks.push(NewEmbeddingTask {
                vcon_uuid: updated.uuid,
                content_type: EmbeddingContentType::Analysis,
                content_reference: format!("analysis_{i}"),
                content_text: body.to_owned(),
            });
        }
    }

    tasks
}
