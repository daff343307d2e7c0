//! Plugin manager.
//!
//! Plugins compose by iteration: `before*` hooks form a left-to-right
//! pipeline where each plugin sees the previous plugin's output and any
//! error aborts the operation; `after*` hooks are fan-out observers whose
//! errors are logged and swallowed because the operation has already
//! committed.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use vcon_domain::entities::Vcon;
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::plugin::{PluginConfig, PluginTool, VconPlugin};
use vcon_domain::value_objects::{RequestContext, SearchCriteria, VconMetadata, VconUpdate};

/// Registry of active plugins, populated at startup and read-only after.
pub struct PluginManager {
    plugins: Vec<Arc<dyn VconPlugin>>,
}

impl PluginManager {
    /// Manager over the given plugins; order is hook execution order.
    #[must_use]
    pub fn new(plugins: Vec<Arc<dyn VconPlugin>>) -> Self {
        Self { plugins }
    }

    /// Manager with no plugins (hooks become no-ops).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Run every plugin's `initialize`, failing fast on the first error.
    pub async fn initialize_all(&self, config: &PluginConfig) -> Result<()> {
        for plugin in &self.plugins {
            plugin
                .initialize(config)
                .await
                .map_err(|e| hook_error(plugin.name(), e))?;
            info!(
                plugin = plugin.name(),
                version = plugin.version(),
                "plugin initialized"
            );
        }
        Ok(())
    }

    /// Run every plugin's `shutdown`, logging failures.
    pub async fn shutdown_all(&self) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.shutdown().await {
                warn!(plugin = plugin.name(), error = %e, "plugin shutdown failed");
            }
        }
    }

    /// Tools contributed by all plugins, with the owning plugin's name.
    #[must_use]
    pub fn tools(&self) -> Vec<(String, PluginTool)> {
        self.plugins
            .iter()
            .flat_map(|p| {
                let owner = p.name().to_owned();
                p.tools().into_iter().map(move |t| (owner.clone(), t))
            })
            .collect()
    }

    /// Route a tool call to the plugin that declared the tool.
    pub async fn handle_tool_call(
        &self,
        name: &str,
        args: Value,
        ctx: &RequestContext,
    ) -> Result<Value> {
        for plugin in &self.plugins {
            if plugin.tools().iter().any(|t| t.name == name) {
                return plugin
                    .handle_tool_call(name, args, ctx)
                    .await
                    .map_err(|e| hook_error(plugin.name(), e));
            }
        }
        Err(Error::not_found(format!("plugin tool '{name}'")))
    }

    pub async fn before_create(&self, mut vcon: Vcon, ctx: &RequestContext) -> Result<Vcon> {
        for plugin in &self.plugins {
            vcon = plugin
                .before_create(vcon, ctx)
                .await
                .map_err(|e| hook_error(plugin.name(), e))?;
        }
        Ok(vcon)
    }

    pub async fn after_create(&self, vcon: &Vcon, ctx: &RequestContext) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.after_create(vcon, ctx).await {
                warn!(plugin = plugin.name(), error = %e, "afterCreate hook failed");
            }
        }
    }

    pub async fn before_read(&self, uuid: &Uuid, ctx: &RequestContext) -> Result<()> {
        for plugin in &self.plugins {
            plugin
                .before_read(uuid, ctx)
                .await
                .map_err(|e| hook_error(plugin.name(), e))?;
        }
        Ok(())
    }

    /// `afterRead` may rewrite the vCon; a failing plugin is skipped and the
    /// last good value is kept.
    pub async fn after_read(&self, mut vcon: Vcon, ctx: &RequestContext) -> Vcon {
        for plugin in &self.plugins {
            match plugin.after_read(vcon.clone(), ctx).await {
                Ok(rewritten) => vcon = rewritten,
                Err(e) => {
                    warn!(plugin = plugin.name(), error = %e, "afterRead hook failed");
                }
            }
        }
        vcon
    }

    pub async fn before_update(
        &self,
        uuid: &Uuid,
        mut patch: VconUpdate,
        ctx: &RequestContext,
    ) -> Result<VconUpdate> {
        for plugin in &self.plugins {
            patch = plugin
                .before_update(uuid, patch, ctx)
                .await
                .map_err(|e| hook_error(plugin.name(), e))?;
        }
        Ok(patch)
    }

    pub async fn after_update(&self, vcon: &Vcon, ctx: &RequestContext) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.after_update(vcon, ctx).await {
                warn!(plugin = plugin.name(), error = %e, "afterUpdate hook failed");
            }
        }
    }

    pub async fn before_delete(&self, uuid: &Uuid, ctx: &RequestContext) -> Result<()> {
        for plugin in &self.plugins {
            plugin
                .before_delete(uuid, ctx)
                .await
                .map_err(|e| hook_error(plugin.name(), e))?;
        }
        Ok(())
    }

    pub async fn after_delete(&self, uuid: &Uuid, ctx: &RequestContext) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.after_delete(uuid, ctx).await {
                warn!(plugin = plugin.name(), error = %e, "afterDelete hook failed");
            }
        }
    }

    pub async fn before_search(
        &self,
        mut criteria: SearchCriteria,
        ctx: &RequestContext,
    ) -> Result<SearchCriteria> {
        for plugin in &self.plugins {
            criteria = plugin
                .before_search(criteria, ctx)
                .await
                .map_err(|e| hook_error(plugin.name(), e))?;
        }
        Ok(criteria)
    }

    /// `afterSearch` may filter or annotate; a failing plugin is skipped.
    pub async fn after_search(
        &self,
        mut results: Vec<VconMetadata>,
        ctx: &RequestContext,
    ) -> Vec<VconMetadata> {
        for plugin in &self.plugins {
            match plugin.after_search(results.clone(), ctx).await {
                Ok(filtered) => results = filtered,
                Err(e) => {
                    warn!(plugin = plugin.name(), error = %e, "afterSearch hook failed");
                }
            }
        }
        results
    }
}

/// Wrap a plugin failure, preserving an existing hook attribution.
fn hook_error(plugin: &str, error: Error) -> Error {
    match error {
        already @ Error::Hook { .. } => already,
        other => Error::hook(plugin, other.to_string()),
    }
}
