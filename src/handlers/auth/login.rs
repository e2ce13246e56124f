use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::role::Role;
use crate::auth::{generate_jwt, password_digest, Claims};
use crate::database::UnscopedDb;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login/:subdomain
///
/// Pre-context path: no tenant scope exists yet, so both lookups here run
/// through deliberately unscoped access: first the subdomain-to-tenant
/// resolution against the global catalog, then the user row. Nothing is
/// written through the unscoped client.
pub async fn login(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let tenant = state
        .tenants
        .find_by_subdomain(&subdomain)
        .await
        .map_err(|e| {
            tracing::error!("Tenant lookup failed for subdomain '{}': {}", subdomain, e);
            ApiError::internal_server_error("Login failed")
        })?
        .ok_or_else(|| ApiError::not_found(format!("No account found for '{}'", subdomain)))?;

    let unscoped = UnscopedDb::new(state.pool.clone());
    let row = sqlx::query(
        "SELECT id, email, role, is_active, password_digest, password_salt \
         FROM users WHERE tenant_id = $1 AND email = $2",
    )
    .bind(tenant.id)
    .bind(&payload.email)
    .fetch_optional(unscoped.pool())
    .await
    .map_err(|e| {
        tracing::error!("User lookup failed during login: {}", e);
        ApiError::internal_server_error("Login failed")
    })?
    // Same response for unknown user and bad password
    .ok_or_else(|| ApiError::unauthenticated("Invalid credentials"))?;

    let is_active: bool = row.get("is_active");
    if !is_active {
        return Err(ApiError::account_disabled("Account is disabled"));
    }

    let stored_digest: String = row.get("password_digest");
    let salt: String = row.get("password_salt");
    if password_digest(&payload.password, &salt) != stored_digest {
        return Err(ApiError::unauthenticated("Invalid credentials"));
    }

    let user_id: Uuid = row.get("id");
    let role_text: String = row.get("role");
    let role = Role::from_str(&role_text).map_err(|e| {
        tracing::error!("User {} has unrecognized role: {}", user_id, e);
        ApiError::internal_server_error("Login failed")
    })?;

    let session_id = state.sessions.create(user_id).await?;

    let claims = Claims::new(user_id, tenant.id, session_id, role);
    let token = generate_jwt(claims).map_err(|e| {
        tracing::error!("JWT generation failed: {}", e);
        ApiError::internal_server_error("Login failed")
    })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token,
            "tenant": {
                "id": tenant.id,
                "name": tenant.name,
                "subdomain": tenant.subdomain,
            },
            "user": {
                "id": user_id,
                "email": row.get::<String, _>("email"),
                "role": role.as_str(),
            }
        }
    })))
}
