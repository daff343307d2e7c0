//! Configuration loading and validation.
//!
//! Layered with figment: built-in defaults, then an optional `vcon.toml`,
//! then `VCON_`-prefixed environment variables (nested keys split on
//! `__`). On top of that the flat environment names from the deployment
//! contract are honored verbatim: `DATABASE_URL`, `REDIS_URL`,
//! `VCON_REDIS_EXPIRY`, `VCON_PLUGINS_PATH`, `RLS_ENABLED`,
//! `TENANT_ATTACHMENT_TYPE`, `TENANT_JSON_PATH`, `CURRENT_TENANT_ID`,
//! `EMBEDDING_MODEL`.

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use vcon_domain::constants::{
    DEFAULT_CACHE_TTL_SECS, EMBEDDING_BATCH_SIZE, EMBEDDING_DIMENSIONS, TENANT_ATTACHMENT_TYPE,
    TENANT_JSON_PATH,
};
use vcon_domain::error::{Error, Result};

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string (required).
    pub url: String,
    pub max_connections: u32,
    /// Per-statement timeout applied to search queries (milliseconds).
    pub statement_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            statement_timeout_ms: 10_000,
        }
    }
}

/// Read-through cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Provider name ("redis", "moka"); `None` disables caching.
    pub provider: Option<String>,
    /// Connection URI for distributed providers.
    pub redis_url: Option<String>,
    /// Whole-vCon entry TTL in seconds.
    pub ttl_secs: u64,
    /// Entry capacity for in-process providers.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: None,
            redis_url: None,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_capacity: 10_000,
        }
    }
}

/// Embedding pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name ("fastembed"); `None` disables semantic indexing.
    pub provider: Option<String>,
    pub model: String,
    pub dimensions: usize,
    /// Tasks claimed per worker cycle.
    pub batch_size: usize,
    /// Worker poll interval in seconds.
    pub poll_interval_secs: u64,
    /// Failed-task sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Some("fastembed".to_owned()),
            model: "all-MiniLM-L6-v2".to_owned(),
            dimensions: EMBEDDING_DIMENSIONS,
            batch_size: EMBEDDING_BATCH_SIZE,
            poll_interval_secs: 2,
            sweep_interval_secs: 60,
        }
    }
}

/// Tenant isolation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Whether row-level security policies are enforced.
    pub rls_enabled: bool,
    /// Attachment type the tenant id is derived from.
    pub attachment_type: String,
    /// JSON path into the attachment body.
    pub json_path: String,
    /// Session tenant installed at startup (overrides JWT-derived values).
    pub current_tenant_id: Option<String>,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            rls_enabled: false,
            attachment_type: TENANT_ATTACHMENT_TYPE.to_owned(),
            json_path: TENANT_JSON_PATH.to_owned(),
            current_tenant_id: None,
        }
    }
}

/// Plugin activation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Registered plugin names to activate, in hook order.
    pub modules: Vec<String>,
    pub license_key: Option<String>,
    pub offline_mode: bool,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub embedding: EmbeddingConfig,
    pub tenant: TenantConfig,
    pub plugins: PluginsConfig,
}

impl AppConfig {
    /// Load configuration from defaults, `vcon.toml` and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("vcon.toml"))
            .merge(Env::prefixed("VCON_CONFIG_").split("__")))
    }

    /// Load from an explicit figment (tests inject their own providers).
    pub fn load_from(figment: Figment) -> Result<Self> {
        let mut config: Self = figment.extract().map_err(|e| Error::Config {
            message: format!("failed to load configuration: {e}"),
        })?;
        config.apply_env_contract();
        validate_config(&config)?;
        Ok(config)
    }

    /// Apply the flat environment names from the deployment contract.
    fn apply_env_contract(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.is_empty()
        {
            self.database.url = url;
        }
        if let Ok(url) = std::env::var("REDIS_URL")
            && !url.is_empty()
        {
            self.cache.redis_url = Some(url);
            self.cache.provider.get_or_insert_with(|| "redis".to_owned());
        }
        if let Ok(ttl) = std::env::var("VCON_REDIS_EXPIRY")
            && let Ok(secs) = ttl.parse()
        {
            self.cache.ttl_secs = secs;
        }
        if let Ok(path) = std::env::var("VCON_PLUGINS_PATH")
            && !path.is_empty()
        {
            self.plugins.modules = path
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(rls) = std::env::var("RLS_ENABLED") {
            self.tenant.rls_enabled = matches!(rls.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(ty) = std::env::var("TENANT_ATTACHMENT_TYPE")
            && !ty.is_empty()
        {
            self.tenant.attachment_type = ty;
        }
        if let Ok(path) = std::env::var("TENANT_JSON_PATH")
            && !path.is_empty()
        {
            self.tenant.json_path = path;
        }
        if let Ok(tenant) = std::env::var("CURRENT_TENANT_ID")
            && !tenant.is_empty()
        {
            self.tenant.current_tenant_id = Some(tenant);
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL")
            && !model.is_empty()
        {
            self.embedding.model = model;
        }
    }
}

/// Validate a loaded configuration, failing fast on the first bad section.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    validate_database_config(config)?;
    validate_cache_config(config)?;
    validate_embedding_config(config)?;
    validate_tenant_config(config)?;
    Ok(())
}

fn validate_database_config(config: &AppConfig) -> Result<()> {
    if config.database.url.is_empty() {
        return Err(Error::ConfigInvalid {
            key: "database.url".to_owned(),
            message: "DATABASE_URL is required".to_owned(),
        });
    }
    if config.database.max_connections == 0 {
        return Err(Error::ConfigInvalid {
            key: "database.max_connections".to_owned(),
            message: "connection pool size cannot be 0".to_owned(),
        });
    }
    Ok(())
}

fn validate_cache_config(config: &AppConfig) -> Result<()> {
    if config.cache.provider.is_some() && config.cache.ttl_secs == 0 {
        return Err(Error::ConfigInvalid {
            key: "cache.ttl_secs".to_owned(),
            message: "cache TTL cannot be 0 when caching is enabled".to_owned(),
        });
    }
    if config.cache.provider.as_deref() == Some("redis") && config.cache.redis_url.is_none() {
        return Err(Error::ConfigInvalid {
            key: "cache.redis_url".to_owned(),
            message: "REDIS_URL is required for the redis cache provider".to_owned(),
        });
    }
    Ok(())
}

fn validate_embedding_config(config: &AppConfig) -> Result<()> {
    if config.embedding.provider.is_some() {
        if config.embedding.dimensions == 0 {
            return Err(Error::ConfigInvalid {
                key: "embedding.dimensions".to_owned(),
                message: "embedding dimensionality cannot be 0".to_owned(),
            });
        }
        if config.embedding.batch_size == 0 {
            return Err(Error::ConfigInvalid {
                key: "embedding.batch_size".to_owned(),
                message: "worker batch size cannot be 0".to_owned(),
            });
        }
    }
    Ok(())
}

fn validate_tenant_config(config: &AppConfig) -> Result<()> {
    if config.tenant.attachment_type.is_empty() {
        return Err(Error::ConfigInvalid {
            key: "tenant.attachment_type".to_owned(),
            message: "tenant attachment type cannot be empty".to_owned(),
        });
    }
    if config.tenant.json_path.is_empty() {
        return Err(Error::ConfigInvalid {
            key: "tenant.json_path".to_owned(),
            message: "tenant JSON path cannot be empty".to_owned(),
        });
    }
    Ok(())
}
