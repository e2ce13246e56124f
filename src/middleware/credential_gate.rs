use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

/// Paths a caller with a pending forced password rotation may still reach:
/// change the credential, log out, or ask who they are. Everything else is
/// blocked until the rotation completes.
const ALLOWED_DURING_ROTATION: &[&str] = &[
    "/api/auth/password",
    "/api/auth/session",
    "/api/auth/whoami",
];

pub async fn credential_gate_middleware(
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(user) = request.extensions().get::<AuthUser>() {
        if user.must_change_password {
            let path = request.uri().path();
            if !ALLOWED_DURING_ROTATION.contains(&path) {
                return Err(ApiError::password_rotation_required(
                    "Password change required before continuing",
                ));
            }
        }
    }
    Ok(next.run(request).await)
}
