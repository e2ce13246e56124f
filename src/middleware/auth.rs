use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::role::Role;
use crate::auth::Claims;
use crate::config;
use crate::error::ApiError;
use crate::state::AppState;

/// Resolved caller identity for the current request. The role and account
/// flags come from the database, not the token, so a deactivation or forced
/// rotation takes effect on the next request rather than at token expiry.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub must_change_password: bool,
}

/// JWT authentication middleware: validates the bearer token, re-reads the
/// user row, and injects `AuthUser` into the request.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthenticated)?;
    let claims = validate_jwt(&token).map_err(ApiError::unauthenticated)?;

    let row = sqlx::query(
        "SELECT id, tenant_id, email, role, is_active, must_change_password FROM users WHERE id = $1",
    )
    .bind(claims.user_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Database error validating user {}: {}", claims.user_id, e);
        ApiError::internal_server_error("Failed to validate user")
    })?
    .ok_or_else(|| {
        tracing::warn!("Token presented for unknown user {}", claims.user_id);
        ApiError::unauthenticated("User no longer exists")
    })?;

    let role_text: String = row.try_get("role").map_err(|e| {
        tracing::error!("Malformed user row for {}: {}", claims.user_id, e);
        ApiError::internal_server_error("Failed to validate user")
    })?;
    let role = Role::from_str(&role_text).map_err(|e| {
        tracing::error!("User {} has unrecognized role: {}", claims.user_id, e);
        ApiError::internal_server_error("Failed to validate user")
    })?;

    let auth_user = AuthUser {
        user_id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        session_id: claims.session_id,
        email: row.get("email"),
        role,
        is_active: row.get("is_active"),
        must_change_password: row.get("must_change_password"),
    };

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// Validate JWT token and extract claims
fn validate_jwt(token: &str) -> Result<Claims, String> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("Invalid JWT token: {}", e))?;

    Ok(token_data.claims)
}

/// Best-effort network origin for audit events.
pub fn request_origin(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
