//! PostgreSQL adapters.
//!
//! Raw SQL over sqlx: the normalized vCon tables, weighted tsvector +
//! trigram keyword search, pgvector cosine search, the tag materialized
//! view, the SKIP LOCKED embedding queue and the RLS tenant session
//! context.

mod ddl;
mod errors;
mod queue;
mod repository;
mod rows;
mod search;
mod tags;
mod tenant;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::sync::{Arc, RwLock};

use vcon_domain::constants::TENANT_SESSION_VAR;
use vcon_domain::error::Result;

pub use ddl::ensure_schema;
pub use errors::map_sqlx_error;
pub use queue::PostgresEmbeddingQueue;
pub use repository::PostgresVconRepository;
pub use search::PostgresSearchRepository;
pub use tags::PostgresTagRepository;
pub use tenant::PostgresTenantContext;

/// Shared handle to the session tenant, read by the pool's connect hook and
/// updated through [`PostgresTenantContext::set_tenant_context`].
pub type SharedTenant = Arc<RwLock<Option<String>>>;

/// Connect a pool, installing the tenant session variable on every new
/// connection when RLS is enabled. The returned handle updates the tenant
/// that future connections will install.
pub async fn connect_pool(
    url: &str,
    max_connections: u32,
    rls_enabled: bool,
    current_tenant: Option<&str>,
) -> Result<(PgPool, SharedTenant)> {
    let tenant: SharedTenant = Arc::new(RwLock::new(current_tenant.map(str::to_owned)));
    let hook_tenant = Arc::clone(&tenant);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .after_connect(move |conn, _meta| {
            let tenant = hook_tenant
                .read()
                .ok()
                .and_then(|guard| guard.clone())
                .filter(|_| rls_enabled);
            Box::pin(async move {
                if let Some(tenant) = tenant {
                    sqlx::query("SELECT set_config($1, $2, false)")
                        .bind(TENANT_SESSION_VAR)
                        .bind(tenant)
                        .execute(&mut *conn)
                        .await?;
                }
                Ok(())
            })
        })
        .connect(url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    // Verify the server is reachable before handing the pool out.
    pool.execute("SELECT 1")
        .await
        .map_err(|e| map_sqlx_error("ping", e))?;

    Ok((pool, tenant))
}
