use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::Tenant;
use crate::middleware::auth::AuthUser;
use crate::services::tenant_directory::{DirectoryError, TenantDirectory};
use crate::session::SessionState;

/// How the effective tenant was chosen, in strict precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantSource {
    /// An active impersonation override in the session.
    Impersonation,
    /// The authenticated caller's own tenant.
    Caller,
    /// The fixed root-tenant fallback for unauthenticated/public paths.
    Fallback,
}

impl TenantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantSource::Impersonation => "impersonation",
            TenantSource::Caller => "caller",
            TenantSource::Fallback => "fallback",
        }
    }
}

/// Per-request effective tenant. Derived from session state every request,
/// passed by value through the call chain, never ambient global state.
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    pub id: Uuid,
    pub name: String,
    pub subdomain: Option<String>,
    pub is_root: bool,
    pub source: TenantSource,
}

impl TenantContext {
    fn from_tenant(tenant: Tenant, source: TenantSource) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            subdomain: tenant.subdomain,
            is_root: tenant.is_root,
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolved id has no tenant record. Fails closed, never treated
    /// as "no restriction".
    #[error("Effective tenant {0} does not exist")]
    UnknownTenant(Uuid),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Pure precedence step: impersonation override, else the caller's own
/// tenant, else the fallback (signaled by `None`).
pub fn effective_tenant_id(
    session: &SessionState,
    caller: Option<&AuthUser>,
) -> (Option<Uuid>, TenantSource) {
    if let Some(tenant_id) = session.impersonating_tenant_id {
        return (Some(tenant_id), TenantSource::Impersonation);
    }
    if let Some(caller) = caller {
        return (Some(caller.tenant_id), TenantSource::Caller);
    }
    (None, TenantSource::Fallback)
}

/// Resolve and load the effective tenant for this request.
///
/// The loaded record must exist; a dangling id is a configuration error and
/// the request dies with a server error rather than proceeding unscoped.
pub async fn resolve_effective_tenant(
    session: &SessionState,
    caller: Option<&AuthUser>,
    directory: &dyn TenantDirectory,
) -> Result<TenantContext, ResolveError> {
    let (tenant_id, source) = effective_tenant_id(session, caller);

    let tenant = match tenant_id {
        Some(id) => directory
            .find_by_id(id)
            .await?
            .ok_or(ResolveError::UnknownTenant(id))?,
        None => {
            // The root tenant doubles as the fallback identity for public
            // paths. That conflation is intentional but worth noticing in
            // logs whenever it is actually exercised.
            let root = directory
                .root()
                .await?
                .ok_or(ResolveError::UnknownTenant(Uuid::nil()))?;
            tracing::warn!(tenant_id = %root.id, "no session tenant; using root fallback context");
            root
        }
    };

    Ok(TenantContext::from_tenant(tenant, source))
}
