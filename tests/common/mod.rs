// Shared across test binaries; not every binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use bookable_api::auth::role::Role;
use bookable_api::database::models::{ImpersonationEvent, Tenant};
use bookable_api::middleware::auth::AuthUser;
use bookable_api::services::impersonation::{AuditError, AuditLog, ImpersonationService};
use bookable_api::services::tenant_directory::{DirectoryError, TenantDirectory};
use bookable_api::session::{SessionError, SessionState, SessionStore};

/// In-memory session store so service-level tests run without a database.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, SessionState>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, _user_id: Uuid) -> Result<Uuid, SessionError> {
        let id = Uuid::new_v4();
        self.sessions
            .lock()
            .unwrap()
            .insert(id, SessionState::default());
        Ok(id)
    }

    async fn load(&self, session_id: Uuid) -> Result<SessionState, SessionError> {
        self.sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::NotFound(session_id))
    }

    async fn save(&self, session_id: Uuid, state: &SessionState) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.contains_key(&session_id) {
            return Err(SessionError::NotFound(session_id));
        }
        sessions.insert(session_id, state.clone());
        Ok(())
    }

    async fn destroy(&self, session_id: Uuid) -> Result<(), SessionError> {
        self.sessions.lock().unwrap().remove(&session_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTenantDirectory {
    tenants: Mutex<Vec<Tenant>>,
}

impl MemoryTenantDirectory {
    pub fn with_tenants(tenants: Vec<Tenant>) -> Self {
        Self { tenants: Mutex::new(tenants) }
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self.tenants.lock().unwrap().iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.subdomain.as_deref() == Some(subdomain))
            .cloned())
    }

    async fn root(&self) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self.tenants.lock().unwrap().iter().find(|t| t.is_root).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Tenant>, DirectoryError> {
        Ok(self.tenants.lock().unwrap().clone())
    }

    async fn create(&self, name: &str, subdomain: Option<&str>) -> Result<Tenant, DirectoryError> {
        let mut tenants = self.tenants.lock().unwrap();
        if tenants.iter().any(|t| t.name == name) {
            return Err(DirectoryError::NameConflict(name.to_string()));
        }
        let tenant = make_tenant(name, subdomain, false);
        tenants.push(tenant.clone());
        Ok(tenant)
    }
}

/// Captures appended events for assertion. Can be flipped into a failing
/// mode to verify transitions survive audit outages.
#[derive(Default)]
pub struct MemoryAuditLog {
    pub events: Mutex<Vec<ImpersonationEvent>>,
    pub fail_appends: Mutex<bool>,
}

impl MemoryAuditLog {
    pub fn set_failing(&self, failing: bool) {
        *self.fail_appends.lock().unwrap() = failing;
    }

    pub fn recorded(&self) -> Vec<ImpersonationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, event: ImpersonationEvent) -> Result<(), AuditError> {
        if *self.fail_appends.lock().unwrap() {
            return Err(AuditError::Database(sqlx::Error::PoolClosed));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub fn make_tenant(name: &str, subdomain: Option<&str>, is_root: bool) -> Tenant {
    Tenant {
        id: Uuid::new_v4(),
        name: name.to_string(),
        subdomain: subdomain.map(|s| s.to_string()),
        is_root,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn auth_user(session_id: Uuid, tenant_id: Uuid, role: Role) -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        tenant_id,
        session_id,
        email: "operator@example.com".to_string(),
        role,
        is_active: true,
        must_change_password: false,
    }
}

pub struct Harness {
    pub sessions: Arc<MemorySessionStore>,
    pub tenants: Arc<MemoryTenantDirectory>,
    pub audit: Arc<MemoryAuditLog>,
    pub service: ImpersonationService,
}

/// Wires an `ImpersonationService` over the in-memory implementations,
/// keeping direct handles to each for assertions.
pub fn harness(tenants: Vec<Tenant>) -> Harness {
    let sessions = Arc::new(MemorySessionStore::default());
    let directory = Arc::new(MemoryTenantDirectory::with_tenants(tenants));
    let audit = Arc::new(MemoryAuditLog::default());
    let service = ImpersonationService::new(
        sessions.clone(),
        directory.clone(),
        audit.clone(),
    );
    Harness { sessions, tenants: directory, audit, service }
}
