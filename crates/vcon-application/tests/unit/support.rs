//! In-memory port implementations shared by the service tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use vcon_domain::entities::{EmbeddingTask, NewEmbeddingTask, Vcon};
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::cache::{CacheEntryConfig, CacheStats};
use vcon_domain::ports::{
    CacheProvider, EmbeddingQueue, TagRepository, VconRepository,
};
use vcon_domain::tags;
use vcon_domain::value_objects::{
    DatabaseShape, DatabaseStats, Embedding, UniqueTagsOptions, UniqueTagsReport, VconMetadata,
    VconUpdate,
};

/// HashMap-backed repository with the store's conflict semantics.
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<HashMap<Uuid, (Vcon, VconMetadata)>>,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl VconRepository for MemoryRepository {
    async fn create(&self, vcon: &Vcon, tenant_id: Option<&str>) -> Result<VconMetadata> {
        let mut store = self.store.lock().await;
        if store.contains_key(&vcon.uuid) {
            return Err(Error::conflict(format!("uuid {} already exists", vcon.uuid)));
        }
        let now = Utc::now();
        let metadata = VconMetadata {
            uuid: vcon.uuid,
            subject: vcon.subject.clone(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant_id.map(str::to_owned),
        };
        let mut stored = vcon.clone();
        stored.created_at = Some(now);
        stored.updated_at = Some(now);
        store.insert(vcon.uuid, (stored, metadata.clone()));
        Ok(metadata)
    }

    async fn get(&self, uuid: &Uuid) -> Result<Option<Vcon>> {
        Ok(self.store.lock().await.get(uuid).map(|(v, _)| v.clone()))
    }

    async fn update(&self, uuid: &Uuid, patch: &VconUpdate) -> Result<Vcon> {
        let mut store = self.store.lock().await;
        let (vcon, metadata) = store
            .get_mut(uuid)
            .ok_or_else(|| Error::not_found(format!("vCon {uuid}")))?;
        if let Some(subject) = &patch.subject {
            vcon.subject = Some(subject.clone());
            metadata.subject = Some(subject.clone());
        }
        if let Some(extensions) = &patch.extensions {
            vcon.extensions = Some(extensions.clone());
        }
        if let Some(must_support) = &patch.must_support {
            vcon.must_support = Some(must_support.clone());
        }
        if let Some(redacted) = &patch.redacted {
            vcon.redacted = Some(redacted.clone());
        }
        if let Some(appended) = &patch.appended {
            vcon.appended = Some(appended.clone());
        }
        vcon.parties.extend(patch.new_parties.iter().cloned());
        vcon.dialog.extend(patch.new_dialogs.iter().cloned());
        vcon.analysis.extend(patch.new_analyses.iter().cloned());
        vcon.attachments.extend(patch.new_attachments.iter().cloned());
        if !patch.new_groups.is_empty() {
            vcon.group
                .get_or_insert_with(Vec::new)
                .extend(patch.new_groups.iter().cloned());
        }
        let now = Utc::now();
        vcon.updated_at = Some(now);
        metadata.updated_at = now;
        Ok(vcon.clone())
    }

    async fn delete(&self, uuid: &Uuid) -> Result<bool> {
        Ok(self.store.lock().await.remove(uuid).is_some())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<VconMetadata>> {
        let store = self.store.lock().await;
        let mut all: Vec<VconMetadata> = store.values().map(|(_, m)| m.clone()).collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn list_by_ids(&self, uuids: &[Uuid]) -> Result<Vec<Vcon>> {
        let store = self.store.lock().await;
        Ok(uuids
            .iter()
            .filter_map(|id| store.get(id).map(|(v, _)| v.clone()))
            .collect())
    }

    async fn metadata(&self, uuid: &Uuid) -> Result<Option<VconMetadata>> {
        Ok(self.store.lock().await.get(uuid).map(|(_, m)| m.clone()))
    }

    async fn shape(&self) -> Result<DatabaseShape> {
        let store = self.store.lock().await;
        let mut tables = BTreeMap::new();
        tables.insert("vcons".to_owned(), store.len() as i64);
        Ok(DatabaseShape {
            tables,
            rls_enabled: false,
        })
    }

    async fn stats(&self) -> Result<DatabaseStats> {
        let store = self.store.lock().await;
        Ok(DatabaseStats {
            vcon_count: store.len() as i64,
            party_count: 0,
            dialog_count: 0,
            analysis_count: 0,
            attachment_count: 0,
            embedding_count: 0,
            pending_embedding_tasks: 0,
            failed_embedding_tasks: 0,
            tagged_vcon_count: 0,
        })
    }
}

/// Tag repository over the same in-memory store, mutating the attachment
/// like the Postgres implementation does.
pub struct MemoryTagRepository {
    pub repository: Arc<MemoryRepository>,
}

#[async_trait]
impl TagRepository for MemoryTagRepository {
    async fn get_tags(&self, uuid: &Uuid) -> Result<BTreeMap<String, String>> {
        let store = self.repository.store.lock().await;
        let (vcon, _) = store
            .get(uuid)
            .ok_or_else(|| Error::not_found(format!("vCon {uuid}")))?;
        tags::tags_of(vcon)
    }

    async fn put_tags(&self, uuid: &Uuid, new_tags: &BTreeMap<String, String>) -> Result<()> {
        let mut store = self.repository.store.lock().await;
        let (vcon, metadata) = store
            .get_mut(uuid)
            .ok_or_else(|| Error::not_found(format!("vCon {uuid}")))?;
        if let Some(i) = vcon.attachment_index_of_type("tags") {
            if new_tags.is_empty() {
                vcon.attachments.remove(i);
            } else {
                vcon.attachments[i] = tags::tags_attachment(new_tags);
            }
        } else if !new_tags.is_empty() {
            vcon.attachments.push(tags::tags_attachment(new_tags));
        }
        let now = Utc::now();
        vcon.updated_at = Some(now);
        metadata.updated_at = now;
        Ok(())
    }

    async fn search_by_tags(
        &self,
        wanted: &BTreeMap<String, String>,
        limit: usize,
    ) -> Result<Vec<Uuid>> {
        let store = self.repository.store.lock().await;
        let mut hits = Vec::new();
        for (uuid, (vcon, _)) in store.iter() {
            let tags = tags::tags_of(vcon)?;
            if wanted.iter().all(|(k, v)| tags.get(k) == Some(v)) {
                hits.push(*uuid);
            }
            if hits.len() >= limit {
                break;
            }
        }
        Ok(hits)
    }

    async fn unique_tags(&self, options: &UniqueTagsOptions) -> Result<UniqueTagsReport> {
        let store = self.repository.store.lock().await;
        let mut tags_by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut counts: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
        for (_, (vcon, _)) in store.iter() {
            for (k, v) in tags::tags_of(vcon)? {
                if let Some(filter) = &options.key_filter
                    && filter != &k
                {
                    continue;
                }
                let values = tags_by_key.entry(k.clone()).or_default();
                if !values.contains(&v) {
                    values.push(v.clone());
                }
                *counts.entry(k).or_default().entry(v).or_default() += 1;
            }
        }
        Ok(UniqueTagsReport {
            keys: tags_by_key.keys().cloned().collect(),
            tags_by_key,
            counts_per_value: options.include_counts.then_some(counts),
        })
    }
}

/// Cache that counts invalidations so tests can assert write-invalidate.
#[derive(Debug, Default)]
pub struct CountingCache {
    entries: Mutex<HashMap<String, String>>,
    pub deletes: AtomicUsize,
}

impl CountingCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }
}

#[async_trait]
impl CacheProvider for CountingCache {
    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set_json(&self, key: &str, value: &str, _config: CacheEntryConfig) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats::default())
    }

    fn provider_name(&self) -> &str {
        "counting"
    }
}

/// Queue that records enqueued tasks without processing them.
#[derive(Default)]
pub struct RecordingQueue {
    pub enqueued: Mutex<Vec<NewEmbeddingTask>>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl EmbeddingQueue for RecordingQueue {
    async fn enqueue(&self, tasks: &[NewEmbeddingTask]) -> Result<usize> {
        let mut enqueued = self.enqueued.lock().await;
        enqueued.extend_from_slice(tasks);
        Ok(tasks.len())
    }

    async fn claim(&self, _batch: usize) -> Result<Vec<EmbeddingTask>> {
        Ok(Vec::new())
    }

    async fn complete(&self, _task: &EmbeddingTask, _embedding: &Embedding) -> Result<()> {
        Ok(())
    }

    async fn fail(&self, _task_id: i64, _error: &str) -> Result<()> {
        Ok(())
    }

    async fn sweep(&self, _max_retries: i32) -> Result<u64> {
        Ok(0)
    }

    async fn purge(&self, vcon_uuid: &Uuid) -> Result<u64> {
        let mut enqueued = self.enqueued.lock().await;
        let before = enqueued.len();
        enqueued.retain(|t| &t.vcon_uuid != vcon_uuid);
        Ok((before - enqueued.len()) as u64)
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self.enqueued.lock().await.len() as i64)
    }
}
