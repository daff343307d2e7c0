//! Tenant session-context adapter.
//!
//! The tenant is installed as a session variable by the pool's
//! `after_connect` hook; updating it here affects connections created from
//! then on, which is the contract for a set-once, process-scoped tenant.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use vcon_domain::constants::TENANT_SESSION_VAR;
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::TenantContext;
use vcon_domain::value_objects::TenantContextReport;

use super::{SharedTenant, map_sqlx_error};

/// sqlx-backed implementation of [`TenantContext`].
pub struct PostgresTenantContext {
    pool: PgPool,
    rls_enabled: bool,
    tenant: SharedTenant,
}

impl PostgresTenantContext {
    pub fn new(pool: PgPool, rls_enabled: bool, tenant: SharedTenant) -> Self {
        Self {
            pool,
            rls_enabled,
            tenant,
        }
    }

    fn expected(&self) -> Option<String> {
        self.tenant.read().ok().and_then(|guard| guard.clone())
    }

    fn set_expected(&self, tenant_id: &str) -> Result<()> {
        let mut guard = self
            .tenant
            .write()
            .map_err(|_| Error::internal("tenant lock poisoned"))?;
        *guard = Some(tenant_id.to_owned());
        Ok(())
    }
}

#[async_trait]
impl TenantContext for PostgresTenantContext {
    async fn set_tenant_context(&self, tenant_id: &str) -> Result<()> {
        self.set_expected(tenant_id)?;
        // New connections pick the tenant up via the connect hook; install
        // it eagerly on one live session so verification sees it too.
        sqlx::query("SELECT set_config($1, $2, false)")
            .bind(TENANT_SESSION_VAR)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_tenant_context", e))?;
        Ok(())
    }

    async fn verify_tenant_context(&self) -> Result<TenantContextReport> {
        let row = sqlx::query("SELECT current_setting($1, true) AS tenant")
            .bind(TENANT_SESSION_VAR)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("verify_tenant_context", e))?;
        let actual: Option<String> = row
            .try_get::<Option<String>, _>("tenant")
            .map_err(|e| map_sqlx_error("verify_tenant_context", e))?
            .filter(|s| !s.is_empty());
        let expected = self.expected();
        Ok(TenantContextReport {
            matches: expected == actual,
            expected,
            actual,
        })
    }

    fn rls_enabled(&self) -> bool {
        self.rls_enabled
    }
}
