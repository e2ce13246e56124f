use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{ImpersonationAction, ImpersonationEvent};
use crate::middleware::auth::AuthUser;
use crate::services::tenant_directory::{DirectoryError, TenantDirectory};
use crate::session::{SessionError, SessionStore};

#[derive(Debug, Error)]
pub enum ImpersonationError {
    #[error("Tenant not found: {0}")]
    TenantNotFound(Uuid),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Append-only sink for impersonation events.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, event: ImpersonationEvent) -> Result<(), AuditError>;
}

/// Writes events to the global `impersonation_events` table. Insert-only;
/// nothing in the codebase updates or deletes these rows.
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, event: ImpersonationEvent) -> Result<(), AuditError> {
        sqlx::query(
            "INSERT INTO impersonation_events (real_user_id, tenant_id, action, origin, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.real_user_id)
        .bind(event.tenant_id)
        .bind(event.action.as_str())
        .bind(&event.origin)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpersonationGrant {
    pub tenant_id: Uuid,
    pub tenant_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpersonationContext {
    pub is_impersonating: bool,
    pub tenant_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
}

/// State machine driver for per-session impersonation:
/// `NotImpersonating -> Impersonating(tenant, started_at) -> NotImpersonating`.
///
/// Ordering inside each transition is load-bearing: the target tenant is
/// verified first (no state change on not-found), the session is durably
/// saved next (the transition has not happened until that write succeeds),
/// and the audit event is appended last, best-effort: a failed append is an
/// operational alarm, logged at error level, but never reverses or masks the
/// outcome the caller already earned.
pub struct ImpersonationService {
    sessions: Arc<dyn SessionStore>,
    tenants: Arc<dyn TenantDirectory>,
    audit: Arc<dyn AuditLog>,
}

impl ImpersonationService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        tenants: Arc<dyn TenantDirectory>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self { sessions, tenants, audit }
    }

    /// Begin impersonating `target`. Role gating (owner floor, and the
    /// refusal to start while already impersonating) happens in the route
    /// guard before this is called.
    pub async fn start(
        &self,
        caller: &AuthUser,
        target: Uuid,
        origin: &str,
    ) -> Result<ImpersonationGrant, ImpersonationError> {
        let tenant = self
            .tenants
            .find_by_id(target)
            .await?
            .ok_or(ImpersonationError::TenantNotFound(target))?;

        let mut state = self.sessions.load(caller.session_id).await?;
        state.begin_impersonation(tenant.id);
        self.sessions.save(caller.session_id, &state).await?;

        tracing::info!(
            user_id = %caller.user_id,
            tenant_id = %tenant.id,
            "impersonation started"
        );
        self.append_event(caller.user_id, tenant.id, ImpersonationAction::Start, origin)
            .await;

        Ok(ImpersonationGrant { tenant_id: tenant.id, tenant_name: tenant.name })
    }

    /// End impersonation. Idempotent: stopping when nothing is active
    /// succeeds and emits no event.
    pub async fn stop(&self, caller: &AuthUser, origin: &str) -> Result<(), ImpersonationError> {
        let mut state = self.sessions.load(caller.session_id).await?;
        let Some(previous) = state.end_impersonation() else {
            return Ok(());
        };
        self.sessions.save(caller.session_id, &state).await?;

        tracing::info!(
            user_id = %caller.user_id,
            tenant_id = %previous,
            "impersonation stopped"
        );
        self.append_event(caller.user_id, previous, ImpersonationAction::Stop, origin)
            .await;

        Ok(())
    }

    pub async fn context(&self, caller: &AuthUser) -> Result<ImpersonationContext, ImpersonationError> {
        let state = self.sessions.load(caller.session_id).await?;
        Ok(ImpersonationContext {
            is_impersonating: state.is_impersonating(),
            tenant_id: state.impersonating_tenant_id,
            started_at: state.impersonation_started_at,
        })
    }

    async fn append_event(&self, user_id: Uuid, tenant_id: Uuid, action: ImpersonationAction, origin: &str) {
        let event = ImpersonationEvent::now(user_id, tenant_id, action, origin);
        if let Err(e) = self.audit.append(event).await {
            // Best-effort additive: the transition already happened and its
            // outcome stands, but a missing audit row is an alarm condition.
            tracing::error!(
                user_id = %user_id,
                tenant_id = %tenant_id,
                action = action.as_str(),
                "failed to append impersonation event: {}",
                e
            );
        }
    }
}
