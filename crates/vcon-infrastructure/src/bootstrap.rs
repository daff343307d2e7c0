//! Provider and service wiring.
//!
//! Assembles the configured providers (database, cache, embeddings,
//! plugins) into the application services consumed by the MCP server, and
//! logs the startup diagnostics the deployment contract calls for: whether
//! RLS is enabled and whether the tenant context was installed.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vcon_application::plugins::PluginManager;
use vcon_application::use_cases::{SearchService, TagService, VconService};
use vcon_domain::error::Result;
use vcon_domain::ports::plugin::PluginConfig;
use vcon_domain::ports::{CacheProvider, EmbeddingProvider, EmbeddingQueue, TenantContext};
use vcon_domain::registry::{
    CacheProviderConfig, EmbeddingProviderConfig, resolve_cache_provider,
    resolve_embedding_provider, resolve_plugins,
};
use vcon_domain::tenant::TenantExtraction;
use vcon_providers::database::postgres::{
    PostgresEmbeddingQueue, PostgresSearchRepository, PostgresTagRepository,
    PostgresTenantContext, PostgresVconRepository, connect_pool, ensure_schema,
};
use vcon_providers::embedding::worker::EmbeddingWorker;

use crate::config::AppConfig;

/// Fully wired application state handed to the server layer.
pub struct AppContext {
    pub config: AppConfig,
    pub vcons: Arc<VconService>,
    pub search: Arc<SearchService>,
    pub tags: Arc<TagService>,
    pub plugins: Arc<PluginManager>,
    pub tenant: Arc<dyn TenantContext>,
    pub queue: Arc<dyn EmbeddingQueue>,
    pub cache: Option<Arc<dyn CacheProvider>>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
}

/// Connect, migrate, resolve providers and build the services.
pub async fn bootstrap(config: AppConfig) -> Result<AppContext> {
    let (pool, shared_tenant) = connect_pool(
        &config.database.url,
        config.database.max_connections,
        config.tenant.rls_enabled,
        config.tenant.current_tenant_id.as_deref(),
    )
    .await?;
    ensure_schema(&pool, config.tenant.rls_enabled).await?;

    let repository = Arc::new(PostgresVconRepository::new(pool.clone()));
    let search_repo = Arc::new(PostgresSearchRepository::new(
        pool.clone(),
        Duration::from_millis(config.database.statement_timeout_ms),
    ));
    let tag_repo = Arc::new(PostgresTagRepository::new(pool.clone()));
    let queue: Arc<dyn EmbeddingQueue> = Arc::new(PostgresEmbeddingQueue::new(pool.clone()));
    let tenant: Arc<dyn TenantContext> = Arc::new(PostgresTenantContext::new(
        pool,
        config.tenant.rls_enabled,
        shared_tenant,
    ));

    let cache = build_cache(&config);
    let embedder = build_embedder(&config);
    let plugins = build_plugins(&config).await?;

    let vcons = Arc::new(
        VconService::new(
            repository.clone() as _,
            Arc::clone(&queue),
            Arc::clone(&plugins),
            cache.clone(),
        )
        .with_cache_ttl(Duration::from_secs(config.cache.ttl_secs))
        .with_tenant_extraction(TenantExtraction {
            attachment_type: config.tenant.attachment_type.clone(),
            json_path: config.tenant.json_path.clone(),
        }),
    );
    let search = Arc::new(SearchService::new(
        repository.clone() as _,
        search_repo as _,
        tag_repo.clone() as _,
        embedder.clone(),
        Arc::clone(&plugins),
    ));
    let tags = Arc::new(TagService::new(tag_repo as _, cache.clone()));

    log_startup(&config, tenant.as_ref()).await;

    Ok(AppContext {
        config,
        vcons,
        search,
        tags,
        plugins,
        tenant,
        queue,
        cache,
        embedder,
    })
}

/// Spawn the embedding worker; cancel the returned token to stop it.
pub fn spawn_embedding_worker(ctx: &AppContext) -> Option<CancellationToken> {
    let embedder = ctx.embedder.clone()?;
    let token = CancellationToken::new();
    let worker = EmbeddingWorker::new(
        Arc::clone(&ctx.queue),
        embedder,
        ctx.config.embedding.batch_size,
        Duration::from_secs(ctx.config.embedding.poll_interval_secs),
        Duration::from_secs(ctx.config.embedding.sweep_interval_secs),
    );
    tokio::spawn(worker.run(token.clone()));
    Some(token)
}

fn build_cache(config: &AppConfig) -> Option<Arc<dyn CacheProvider>> {
    let provider = config.cache.provider.as_deref()?;
    let resolved = resolve_cache_provider(&CacheProviderConfig {
        provider: provider.to_owned(),
        uri: config.cache.redis_url.clone(),
        max_capacity: Some(config.cache.max_capacity),
        ttl_secs: Some(config.cache.ttl_secs),
    });
    match resolved {
        Ok(cache) => {
            info!(provider = cache.provider_name(), "cache enabled");
            Some(cache)
        }
        Err(e) => {
            // The cache is never a correctness dependency.
            warn!(error = %e, "cache unavailable, continuing without it");
            None
        }
    }
}

fn build_embedder(config: &AppConfig) -> Option<Arc<dyn EmbeddingProvider>> {
    let provider = config.embedding.provider.as_deref()?;
    let resolved = resolve_embedding_provider(&EmbeddingProviderConfig {
        provider: provider.to_owned(),
        model: Some(config.embedding.model.clone()),
        dimensions: Some(config.embedding.dimensions),
    });
    match resolved {
        Ok(embedder) => {
            info!(
                provider = embedder.provider_name(),
                dimensions = embedder.dimensions(),
                "embedding provider ready"
            );
            Some(embedder)
        }
        Err(e) => {
            warn!(error = %e, "embedding provider unavailable, semantic indexing disabled");
            None
        }
    }
}

async fn build_plugins(config: &AppConfig) -> Result<Arc<PluginManager>> {
    let plugin_config = PluginConfig {
        license_key: config.plugins.license_key.clone(),
        offline_mode: config.plugins.offline_mode,
        settings: serde_json::Value::Null,
    };
    let plugins = resolve_plugins(&config.plugins.modules, &plugin_config)?;
    let manager = Arc::new(PluginManager::new(plugins));
    manager.initialize_all(&plugin_config).await?;
    Ok(manager)
}

async fn log_startup(config: &AppConfig, tenant: &dyn TenantContext) {
    info!(
        rls_enabled = config.tenant.rls_enabled,
        tenant_attachment = %config.tenant.attachment_type,
        "tenant isolation configured"
    );
    if config.tenant.rls_enabled {
        match tenant.verify_tenant_context().await {
            Ok(report) if report.matches => {
                info!(tenant = ?report.actual, "tenant context installed");
            }
            Ok(report) => {
                warn!(
                    expected = ?report.expected,
                    actual = ?report.actual,
                    "tenant context mismatch"
                );
            }
            Err(e) => warn!(error = %e, "tenant context verification failed"),
        }
    }
}
