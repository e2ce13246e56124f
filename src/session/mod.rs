use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

/// Server-side session state. Clients hold only the opaque session id (via
/// the bearer token); the impersonation override is never client-trusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub impersonating_tenant_id: Option<Uuid>,
    pub impersonation_started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn is_impersonating(&self) -> bool {
        self.impersonating_tenant_id.is_some()
    }

    pub fn begin_impersonation(&mut self, tenant_id: Uuid) {
        self.impersonating_tenant_id = Some(tenant_id);
        self.impersonation_started_at = Some(Utc::now());
    }

    /// Clears any active impersonation, returning the tenant that was
    /// active.
    pub fn end_impersonation(&mut self) -> Option<Uuid> {
        let previous = self.impersonating_tenant_id.take();
        self.impersonation_started_at = None;
        previous
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Durable session storage. `save` must not return until the state is
/// persisted; a client must never observe a successful impersonation
/// transition that a concurrent request could still miss.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: Uuid) -> Result<Uuid, SessionError>;
    async fn load(&self, session_id: Uuid) -> Result<SessionState, SessionError>;
    async fn save(&self, session_id: Uuid, state: &SessionState) -> Result<(), SessionError>;
    async fn destroy(&self, session_id: Uuid) -> Result<(), SessionError>;
}

/// Postgres-backed session store over the global, user-keyed `sessions`
/// table (deliberately unregistered in the tenant-table registry).
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: Uuid) -> Result<Uuid, SessionError> {
        let row = sqlx::query(
            "INSERT INTO sessions (user_id) VALUES ($1) RETURNING id",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn load(&self, session_id: Uuid) -> Result<SessionState, SessionError> {
        let row = sqlx::query(
            "SELECT impersonating_tenant_id, impersonation_started_at FROM sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(SessionError::NotFound(session_id))?;

        Ok(SessionState {
            impersonating_tenant_id: row.try_get("impersonating_tenant_id")?,
            impersonation_started_at: row.try_get("impersonation_started_at")?,
        })
    }

    async fn save(&self, session_id: Uuid, state: &SessionState) -> Result<(), SessionError> {
        let result = sqlx::query(
            "UPDATE sessions SET impersonating_tenant_id = $1, impersonation_started_at = $2, updated_at = now() WHERE id = $3",
        )
        .bind(state.impersonating_tenant_id)
        .bind(state.impersonation_started_at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SessionError::NotFound(session_id));
        }
        Ok(())
    }

    async fn destroy(&self, session_id: Uuid) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_impersonation_returns_previous_tenant() {
        let mut state = SessionState::default();
        assert!(!state.is_impersonating());
        assert_eq!(state.end_impersonation(), None);

        let tenant = Uuid::new_v4();
        state.begin_impersonation(tenant);
        assert!(state.is_impersonating());
        assert!(state.impersonation_started_at.is_some());

        assert_eq!(state.end_impersonation(), Some(tenant));
        assert!(!state.is_impersonating());
        assert!(state.impersonation_started_at.is_none());
    }
}
