use axum::{
    extract::{Path, Query},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::role::{require_role, Role};
use crate::database::registry;
use crate::database::ScopedDb;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::auth::AuthUser;
use crate::session::SessionState;

/// Routes only serve collections in the tenant table registry. Globals like
/// `users` and `sessions` are reachable through their own dedicated routes,
/// never through the generic data surface.
fn require_registered(table: &str) -> Result<(), ApiError> {
    if registry::is_registered(table) {
        Ok(())
    } else {
        Err(ApiError::not_found(format!("Unknown collection '{}'", table)))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// GET /api/data/:table
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Extension(db): Extension<ScopedDb>,
    Path(table): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Employee)?;
    require_registered(&table)?;

    let filter = FilterData {
        limit: params.limit,
        offset: params.offset,
        ..Default::default()
    };
    let records = db.select(&table, filter)?.fetch_all(db.pool()).await?;

    Ok(Json(json!({ "success": true, "data": records })))
}

/// POST /api/find/:table
///
/// Full filter language in the body. The tenant predicate is welded on
/// underneath whatever the caller sends.
pub async fn find(
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Extension(db): Extension<ScopedDb>,
    Path(table): Path<String>,
    Json(filter): Json<FilterData>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Employee)?;
    require_registered(&table)?;

    let records = db.select(&table, filter)?.fetch_all(db.pool()).await?;

    Ok(Json(json!({ "success": true, "data": records })))
}

/// POST /api/data/:table
///
/// Accepts one object or an array of objects. Any tenant column in the
/// payload is overwritten with the session's effective tenant.
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Extension(db): Extension<ScopedDb>,
    Path(table): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Employee)?;
    require_registered(&table)?;

    let created = db.insert(&table, payload)?.fetch_created(db.pool()).await?;

    Ok(Json(json!({ "success": true, "data": created })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub set: Value,
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
}

/// PATCH /api/data/:table
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Extension(db): Extension<ScopedDb>,
    Path(table): Path<String>,
    Json(payload): Json<UpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Employee)?;
    require_registered(&table)?;

    let mut query = db.update(&table, payload.set)?;
    if let Some(conditions) = payload.where_clause {
        query = query.filter(conditions)?;
    }
    let affected = query.execute(db.pool()).await?;

    Ok(Json(json!({ "success": true, "data": { "affected": affected } })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
}

/// DELETE /api/data/:table
///
/// Manager floor. Even with no body filter the statement stays bounded to
/// the effective tenant's rows.
pub async fn destroy(
    Extension(auth): Extension<AuthUser>,
    Extension(session): Extension<SessionState>,
    Extension(db): Extension<ScopedDb>,
    Path(table): Path<String>,
    payload: Option<Json<DeleteRequest>>,
) -> Result<Json<Value>, ApiError> {
    require_role(Some(&auth), &session, Role::Manager)?;
    require_registered(&table)?;

    let mut query = db.delete(&table)?;
    if let Some(Json(DeleteRequest { where_clause: Some(conditions) })) = payload {
        query = query.filter(conditions)?;
    }
    let affected = query.execute(db.pool()).await?;

    Ok(Json(json!({ "success": true, "data": { "affected": affected } })))
}
