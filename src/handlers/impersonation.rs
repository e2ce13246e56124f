use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::role::{require_role, Role};
use crate::error::ApiError;
use crate::middleware::auth::{request_origin, AuthUser};
use crate::session::SessionState;
use crate::state::AppState;

/// POST /api/impersonate/:tenant_id
///
/// Owner-only. The role gate also rejects this while an impersonation is
/// already active, so an operator has to stop explicitly before retargeting.
pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Owner)?;

    let origin = request_origin(&headers);
    let grant = state.impersonation.start(&auth, tenant_id, &origin).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "impersonating": true,
            "tenant": {
                "id": grant.tenant_id,
                "name": grant.tenant_name,
            }
        }
    })))
}

/// DELETE /api/impersonate
///
/// Idempotent. Stopping twice in a row is a no-op, not an error.
pub async fn stop(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let origin = request_origin(&headers);
    state.impersonation.stop(&auth, &origin).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "impersonating": false }
    })))
}

/// GET /api/impersonate
pub async fn context(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let ctx = state.impersonation.context(&auth).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "impersonating": ctx.is_impersonating,
            "tenant_id": ctx.tenant_id,
            "started_at": ctx.started_at,
        }
    })))
}
