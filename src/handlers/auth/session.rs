use axum::{extract::State, response::Json, Extension};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;

use crate::auth::password_digest;
use crate::context::TenantContext;
use crate::error::ApiError;
use crate::middleware::auth::{request_origin, AuthUser};
use crate::session::SessionState;
use crate::state::AppState;

/// GET /api/auth/whoami
///
/// Reports the caller's identity alongside the tenant scope their requests
/// actually execute under, so an operator can always see which tenant an
/// impersonated session is reading.
pub async fn whoami(
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({
        "success": true,
        "data": {
            "user": {
                "id": auth.user_id,
                "email": auth.email,
                "role": auth.role.as_str(),
                "tenant_id": auth.tenant_id,
                "must_change_password": auth.must_change_password,
            },
            "effective_tenant": {
                "id": tenant.id,
                "name": tenant.name,
                "subdomain": tenant.subdomain,
                "source": tenant.source.as_str(),
            },
            "impersonating": session.is_impersonating(),
        }
    })))
}

/// DELETE /api/auth/session
///
/// Terminating a session while an impersonation is active counts as a stop
/// transition, so the audit trail records it before the session row goes away.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let origin = request_origin(&headers);
    state.impersonation.stop(&auth, &origin).await?;
    state.sessions.destroy(auth.session_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "message": "Session terminated" }
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// PUT /api/auth/password
///
/// One of the few routes reachable while a credential rotation is pending.
/// Completing it clears the rotation flag.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.new_password.len() < 8 {
        return Err(ApiError::validation_error(
            "New password must be at least 8 characters",
        ));
    }

    let row = sqlx::query("SELECT password_digest, password_salt FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Credential lookup failed: {}", e);
            ApiError::internal_server_error("Password change failed")
        })?
        .ok_or_else(|| ApiError::unauthenticated("Authentication required"))?;

    let stored_digest: String = row.get("password_digest");
    let salt: String = row.get("password_salt");
    if password_digest(&payload.current_password, &salt) != stored_digest {
        return Err(ApiError::unauthenticated("Current password is incorrect"));
    }

    let new_salt = uuid::Uuid::new_v4().to_string();
    let new_digest = password_digest(&payload.new_password, &new_salt);

    sqlx::query(
        "UPDATE users SET password_digest = $1, password_salt = $2, \
         must_change_password = false, updated_at = now() WHERE id = $3",
    )
    .bind(&new_digest)
    .bind(&new_salt)
    .bind(auth.user_id)
    .execute(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Credential update failed: {}", e);
        ApiError::internal_server_error("Password change failed")
    })?;

    tracing::info!("User {} rotated credentials", auth.user_id);

    Ok(Json(json!({
        "success": true,
        "data": { "message": "Password updated" }
    })))
}
