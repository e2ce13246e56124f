use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::role::{require_role, Role};
use crate::database::registry;
use crate::database::UnscopedDb;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::auth::AuthUser;
use crate::session::SessionState;
use crate::state::AppState;

/// GET /api/root/tenants
///
/// Owner-only catalog listing. The role gate refuses this during an active
/// impersonation, so a borrowed session can never enumerate other tenants.
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Owner)?;

    let tenants = state.tenants.list_all().await?;
    let data: Vec<Value> = tenants
        .into_iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "subdomain": t.subdomain,
                "is_root": t.is_root,
                "created_at": t.created_at,
            })
        })
        .collect();

    Ok(Json(json!({ "success": true, "data": data })))
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub subdomain: Option<String>,
}

/// POST /api/root/tenants
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Json(payload): Json<CreateTenantRequest>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Owner)?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::validation_error("Tenant name cannot be empty"));
    }

    let tenant = state
        .tenants
        .create(&payload.name, payload.subdomain.as_deref())
        .await?;

    tracing::info!(tenant_id = %tenant.id, "Tenant '{}' created by {}", tenant.name, auth.user_id);

    Ok(Json(json!({
        "success": true,
        "data": {
            "id": tenant.id,
            "name": tenant.name,
            "subdomain": tenant.subdomain,
        }
    })))
}

/// POST /api/root/find/:table
///
/// Cross-tenant read for owner tooling, through the escape hatch: no tenant
/// predicate is applied, so rows from every tenant come back. Restricted to
/// registered tables and refused during impersonation like every other
/// owner-floor operation.
pub async fn find_across_tenants(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Path(table): Path<String>,
    Json(filter): Json<FilterData>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Owner)?;

    if !registry::is_registered(&table) {
        return Err(ApiError::not_found(format!("Unknown collection '{}'", table)));
    }

    let unscoped = UnscopedDb::new(state.pool.clone());
    let records = unscoped.select(&table, filter).await?;

    Ok(Json(json!({ "success": true, "data": records })))
}
