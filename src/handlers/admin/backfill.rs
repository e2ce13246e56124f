use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::role::{require_role, Role};
use crate::database::UnscopedDb;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::backfill;
use crate::session::SessionState;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    pub tenant_id: Uuid,
}

/// POST /api/root/backfill/:table
///
/// Owner-only migration tool: claims rows whose tenant column is still NULL
/// for the given tenant. Rows already owned by any tenant are untouched.
pub async fn claim(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Path(table): Path<String>,
    Json(payload): Json<BackfillRequest>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Owner)?;

    state
        .tenants
        .find_by_id(payload.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tenant {} not found", payload.tenant_id)))?;

    let unscoped = UnscopedDb::new(state.pool.clone());
    let report = backfill::claim_legacy_rows(&unscoped, &table, payload.tenant_id).await?;

    tracing::info!(
        table = %report.table,
        tenant_id = %report.tenant_id,
        rows = report.rows_claimed,
        "Legacy rows claimed by {}", auth.user_id
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "table": report.table,
            "tenant_id": report.tenant_id,
            "rows_claimed": report.rows_claimed,
        }
    })))
}
