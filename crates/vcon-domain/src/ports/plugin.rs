//! Plugin / lifecycle-hook port.
//!
//! A plugin is a value implementing any subset of the ten operation hooks
//! plus optional lifecycle methods and extra MCP tools. `before*` hooks may
//! mutate their payload or abort the operation by returning an error;
//! `after*` hooks are observers whose failures never fail the operation.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::entities::Vcon;
use crate::error::{Error, Result};
use crate::value_objects::{RequestContext, SearchCriteria, VconMetadata, VconUpdate};

/// Configuration handed to [`VconPlugin::initialize`].
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    pub license_key: Option<String>,
    pub offline_mode: bool,
    /// Provider-specific settings passed through verbatim.
    pub settings: Value,
}

/// An extra MCP tool contributed by a plugin.
#[derive(Debug, Clone)]
pub struct PluginTool {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

/// Capability set a third-party module implements to observe or mutate
/// store operations. Every method has a no-op default, so a plugin only
/// writes the hooks it cares about.
#[async_trait]
pub trait VconPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Semver-shaped version string.
    fn version(&self) -> &str;

    async fn initialize(&self, _config: &PluginConfig) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Extra tools this plugin exposes through the registry.
    fn tools(&self) -> Vec<PluginTool> {
        Vec::new()
    }

    /// Handle a call to one of this plugin's tools.
    async fn handle_tool_call(
        &self,
        name: &str,
        _args: Value,
        _ctx: &RequestContext,
    ) -> Result<Value> {
        Err(Error::not_found(format!("plugin tool '{name}'")))
    }

    /// May mutate the vCon before validation, or abort.
    async fn before_create(&self, vcon: Vcon, _ctx: &RequestContext) -> Result<Vcon> {
        Ok(vcon)
    }

    /// Observation only; runs after the write committed.
    async fn after_create(&self, _vcon: &Vcon, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }

    /// May abort to deny access.
    async fn before_read(&self, _uuid: &Uuid, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }

    /// May mutate the returned vCon (redaction, filtering).
    async fn after_read(&self, vcon: Vcon, _ctx: &RequestContext) -> Result<Vcon> {
        Ok(vcon)
    }

    /// May mutate the patch or abort (validation, legal hold).
    async fn before_update(
        &self,
        _uuid: &Uuid,
        patch: VconUpdate,
        _ctx: &RequestContext,
    ) -> Result<VconUpdate> {
        Ok(patch)
    }

    /// Observation only.
    async fn after_update(&self, _vcon: &Vcon, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }

    /// May abort to prevent deletion.
    async fn before_delete(&self, _uuid: &Uuid, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }

    /// Observation only.
    async fn after_delete(&self, _uuid: &Uuid, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }

    /// May mutate the criteria (e.g. inject a tag filter).
    async fn before_search(
        &self,
        criteria: SearchCriteria,
        _ctx: &RequestContext,
    ) -> Result<SearchCriteria> {
        Ok(criteria)
    }

    /// May filter or annotate the hydrated result metadata.
    async fn after_search(
        &self,
        results: Vec<VconMetadata>,
        _ctx: &RequestContext,
    ) -> Result<Vec<VconMetadata>> {
        Ok(results)
    }
}
