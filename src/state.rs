use sqlx::PgPool;
use std::sync::Arc;

use crate::services::impersonation::{ImpersonationService, PgAuditLog};
use crate::services::tenant_directory::PgTenantDirectory;
use crate::services::TenantDirectory;
use crate::session::{PgSessionStore, SessionStore};

/// Shared per-process wiring handed to the router. Everything request-scoped
/// (the effective tenant, the scoped facade) is derived per request by the
/// middleware chain, never stored here.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sessions: Arc<dyn SessionStore>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub impersonation: Arc<ImpersonationService>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
        let tenants: Arc<dyn TenantDirectory> = Arc::new(PgTenantDirectory::new(pool.clone()));
        let audit = Arc::new(PgAuditLog::new(pool.clone()));
        let impersonation = Arc::new(ImpersonationService::new(
            sessions.clone(),
            tenants.clone(),
            audit,
        ));
        Self { pool, sessions, tenants, impersonation }
    }
}
