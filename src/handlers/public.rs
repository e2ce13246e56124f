use axum::response::Json;
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;
use crate::error::ApiError;

/// GET /
pub async fn root_info() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    }))
}

/// GET /health
pub async fn health() -> Result<Json<Value>, ApiError> {
    DatabaseManager::health_check().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("Database unreachable")
    })?;

    Ok(Json(json!({ "status": "healthy" })))
}
