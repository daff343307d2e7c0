//! Tag subsystem service.
//!
//! The `tags` attachment is the source of truth; every mutation rewrites it
//! through the tag repository (which also refreshes the materialized view
//! and bumps the parent's `updated_at`) and then invalidates the cached
//! copy of the whole vCon.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use vcon_domain::constants::CACHE_KEY_PREFIX;
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::{CacheProvider, TagRepository};
use vcon_domain::value_objects::{UniqueTagsOptions, UniqueTagsReport};

/// Tag operations over the tag repository.
pub struct TagService {
    tags: Arc<dyn TagRepository>,
    cache: Option<Arc<dyn CacheProvider>>,
}

impl TagService {
    pub fn new(tags: Arc<dyn TagRepository>, cache: Option<Arc<dyn CacheProvider>>) -> Self {
        Self { tags, cache }
    }

    /// All tags of a vCon.
    pub async fn get_all(&self, uuid: &Uuid) -> Result<BTreeMap<String, String>> {
        self.tags.get_tags(uuid).await
    }

    /// One tag value, `None` when the key is unset.
    pub async fn get(&self, uuid: &Uuid, key: &str) -> Result<Option<String>> {
        Ok(self.tags.get_tags(uuid).await?.remove(key))
    }

    /// Set one tag. With `overwrite = false` an existing key is a conflict.
    pub async fn set(
        &self,
        uuid: &Uuid,
        key: &str,
        value: &str,
        overwrite: bool,
    ) -> Result<BTreeMap<String, String>> {
        if key.is_empty() || key.contains(':') {
            return Err(Error::validation(
                "key",
                "tag keys must be non-empty and must not contain ':'",
            ));
        }
        let mut tags = self.tags.get_tags(uuid).await?;
        if !overwrite && tags.contains_key(key) {
            return Err(Error::conflict(format!(
                "tag '{key}' already exists and overwrite is false"
            )));
        }
        tags.insert(key.to_owned(), value.to_owned());
        self.tags.put_tags(uuid, &tags).await?;
        self.invalidate(uuid).await;
        Ok(tags)
    }

    /// Merge or replace the whole tag set.
    pub async fn update(
        &self,
        uuid: &Uuid,
        new_tags: BTreeMap<String, String>,
        merge: bool,
    ) -> Result<BTreeMap<String, String>> {
        let tags = if merge {
            let mut merged = self.tags.get_tags(uuid).await?;
            merged.extend(new_tags);
            merged
        } else {
            new_tags
        };
        self.tags.put_tags(uuid, &tags).await?;
        self.invalidate(uuid).await;
        Ok(tags)
    }

    /// Remove one tag; removing an unset key is a no-op.
    pub async fn remove(&self, uuid: &Uuid, key: &str) -> Result<BTreeMap<String, String>> {
        let mut tags = self.tags.get_tags(uuid).await?;
        if tags.remove(key).is_some() {
            self.tags.put_tags(uuid, &tags).await?;
            self.invalidate(uuid).await;
        }
        Ok(tags)
    }

    /// Drop the whole tag set (and with it the tags attachment).
    pub async fn remove_all(&self, uuid: &Uuid) -> Result<()> {
        self.tags.put_tags(uuid, &BTreeMap::new()).await?;
        self.invalidate(uuid).await;
        Ok(())
    }

    /// UUIDs whose tags contain every supplied pair.
    pub async fn search(
        &self,
        tags: &BTreeMap<String, String>,
        limit: usize,
    ) -> Result<Vec<Uuid>> {
        if tags.is_empty() {
            return Err(Error::validation("tags", "at least one tag is required"));
        }
        self.tags.search_by_tags(tags, limit).await
    }

    /// Distinct keys and values across all tagged vCons.
    pub async fn unique(&self, options: &UniqueTagsOptions) -> Result<UniqueTagsReport> {
        self.tags.unique_tags(options).await
    }

    async fn invalidate(&self, uuid: &Uuid) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(e) = cache.delete(&format!("{CACHE_KEY_PREFIX}{uuid}")).await {
            warn!(uuid = %uuid, error = %e, "cache invalidation failed after tag write");
        }
    }
}
