//! Tenant session-context port.

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::TenantContextReport;

/// Installs and verifies the current-tenant database session variable that
/// the row-level-security policies key on.
#[async_trait]
pub trait TenantContext: Send + Sync {
    /// Install `tenant_id` as the session tenant for subsequent statements.
    async fn set_tenant_context(&self, tenant_id: &str) -> Result<()>;

    /// Compare the configured tenant against what the database session
    /// actually reports.
    async fn verify_tenant_context(&self) -> Result<TenantContextReport>;

    /// Whether row-level security is active.
    fn rls_enabled(&self) -> bool;
}
