//! vCon persistence port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::Vcon;
use crate::error::Result;
use crate::value_objects::{DatabaseShape, DatabaseStats, VconMetadata, VconUpdate};

/// Normalized persistence of vCon containers.
///
/// Implementations serialize a container into the relational child tables
/// and back, inside a single transaction per write. Index densification
/// (unique, gap-free child indexes from zero) is the implementation's
/// responsibility; callers hand over ordered arrays.
#[async_trait]
pub trait VconRepository: Send + Sync {
    /// Insert a new container with the given derived tenant id.
    ///
    /// Fails with `Conflict` when the uuid already exists.
    async fn create(&self, vcon: &Vcon, tenant_id: Option<&str>) -> Result<VconMetadata>;

    /// Materialize the full container, `None` when unknown.
    async fn get(&self, uuid: &Uuid) -> Result<Option<Vcon>>;

    /// Apply a patch under a parent row lock and return the new state.
    async fn update(&self, uuid: &Uuid, patch: &VconUpdate) -> Result<Vcon>;

    /// Delete the container and every child row. Returns `false` when the
    /// uuid was unknown.
    async fn delete(&self, uuid: &Uuid) -> Result<bool>;

    /// Most recently updated containers.
    async fn list_recent(&self, limit: usize) -> Result<Vec<VconMetadata>>;

    /// Hydrate a specific id set (unknown ids are skipped).
    async fn list_by_ids(&self, uuids: &[Uuid]) -> Result<Vec<Vcon>>;

    /// Metadata-only lookup, cheaper than [`Self::get`].
    async fn metadata(&self, uuid: &Uuid) -> Result<Option<VconMetadata>>;

    /// Table shape report for introspection.
    async fn shape(&self) -> Result<DatabaseShape>;

    /// Aggregate statistics for introspection.
    async fn stats(&self) -> Result<DatabaseStats>;
}
