//! Plugin registry.
//!
//! Plugins are compiled in and register themselves here; the configured
//! plugin name list decides which of them activate. This is the in-process
//! rendition of a loadable-module list: the configuration surface stays the
//! same while loading stays type-safe.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ports::plugin::{PluginConfig, VconPlugin};

/// Registry entry for a plugin factory.
pub struct PluginEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: fn(&PluginConfig) -> std::result::Result<Arc<dyn VconPlugin>, String>,
}

#[linkme::distributed_slice]
pub static VCON_PLUGINS: [PluginEntry] = [..];

/// Instantiate the plugins the configuration names, in list order.
///
/// Order matters: `before*` hooks run left-to-right in this order.
pub fn resolve_plugins(
    names: &[String],
    config: &PluginConfig,
) -> Result<Vec<Arc<dyn VconPlugin>>> {
    let mut plugins = Vec::with_capacity(names.len());
    for name in names {
        let entry = VCON_PLUGINS
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::ConfigInvalid {
                key: "plugins".to_owned(),
                message: format!(
                    "unknown plugin '{name}' (registered: {})",
                    VCON_PLUGINS
                        .iter()
                        .map(|e| e.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })?;
        let plugin = (entry.factory)(config).map_err(|message| Error::ConfigInvalid {
            key: "plugins".to_owned(),
            message: format!("plugin '{name}' failed to build: {message}"),
        })?;
        plugins.push(plugin);
    }
    Ok(plugins)
}
