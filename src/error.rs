// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// The 401/403 variants are deliberately distinct rather than folded into a
/// generic Forbidden: callers need to message "your account is disabled",
/// "your role is too low", and "owner actions are blocked while
/// impersonating" differently, and the audit trail needs to tell them apart.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError(String),

    // 401 Unauthorized
    Unauthenticated(String),

    // 403 Forbidden
    AccountDisabled(String),
    InsufficientPermissions(String),
    ImpersonationForbidden(String),
    PasswordRotationRequired(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError(_) => 400,
            ApiError::Unauthenticated(_) => 401,
            ApiError::AccountDisabled(_) => 403,
            ApiError::InsufficientPermissions(_) => 403,
            ApiError::ImpersonationForbidden(_) => 403,
            ApiError::PasswordRotationRequired(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError(msg) => msg,
            ApiError::Unauthenticated(msg) => msg,
            ApiError::AccountDisabled(msg) => msg,
            ApiError::InsufficientPermissions(msg) => msg,
            ApiError::ImpersonationForbidden(msg) => msg,
            ApiError::PasswordRotationRequired(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::AccountDisabled(_) => "ACCOUNT_DISABLED",
            ApiError::InsufficientPermissions(_) => "INSUFFICIENT_PERMISSIONS",
            ApiError::ImpersonationForbidden(_) => "IMPERSONATION_FORBIDDEN",
            ApiError::PasswordRotationRequired(_) => "PASSWORD_ROTATION_REQUIRED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        ApiError::ValidationError(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn account_disabled(message: impl Into<String>) -> Self {
        ApiError::AccountDisabled(message.into())
    }

    pub fn insufficient_permissions(message: impl Into<String>) -> Self {
        ApiError::InsufficientPermissions(message.into())
    }

    pub fn impersonation_forbidden(message: impl Into<String>) -> Self {
        ApiError::ImpersonationForbidden(message.into())
    }

    pub fn password_rotation_required(message: impl Into<String>) -> Self {
        ApiError::PasswordRotationRequired(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::database::scoped::QueryError> for ApiError {
    fn from(err: crate::database::scoped::QueryError) -> Self {
        match err {
            crate::database::scoped::QueryError::Filter(e) => ApiError::validation_error(e.to_string()),
            crate::database::scoped::QueryError::InvalidValues(msg) => ApiError::bad_request(msg),
            crate::database::scoped::QueryError::Sqlx(e) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database query error: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::database::manager::DatabaseError> for ApiError {
    fn from(err: crate::database::manager::DatabaseError) -> Self {
        match err {
            crate::database::manager::DatabaseError::ConfigMissing(_)
            | crate::database::manager::DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database configuration error: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            crate::database::manager::DatabaseError::Sqlx(e) => {
                tracing::error!("SQLx error: {}", e);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<crate::filter::error::FilterError> for ApiError {
    fn from(err: crate::filter::error::FilterError) -> Self {
        ApiError::validation_error(err.to_string())
    }
}

impl From<crate::context::ResolveError> for ApiError {
    fn from(err: crate::context::ResolveError) -> Self {
        match err {
            // Fail closed: an unresolvable tenant id must never degrade to
            // unscoped access, so this is a server error, not a 404.
            crate::context::ResolveError::UnknownTenant(id) => {
                tracing::error!("Effective tenant {} does not exist; failing closed", id);
                ApiError::internal_server_error("Tenant context could not be resolved")
            }
            crate::context::ResolveError::Directory(e) => {
                tracing::error!("Tenant directory error: {}", e);
                ApiError::internal_server_error("Tenant context could not be resolved")
            }
        }
    }
}

impl From<crate::services::impersonation::ImpersonationError> for ApiError {
    fn from(err: crate::services::impersonation::ImpersonationError) -> Self {
        match err {
            crate::services::impersonation::ImpersonationError::TenantNotFound(id) => {
                ApiError::not_found(format!("Tenant {} not found", id))
            }
            crate::services::impersonation::ImpersonationError::Session(e) => {
                tracing::error!("Session store error during impersonation transition: {}", e);
                ApiError::internal_server_error("Failed to persist session state")
            }
            crate::services::impersonation::ImpersonationError::Directory(e) => {
                tracing::error!("Tenant directory error during impersonation: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::services::tenant_directory::DirectoryError> for ApiError {
    fn from(err: crate::services::tenant_directory::DirectoryError) -> Self {
        match err {
            crate::services::tenant_directory::DirectoryError::NameConflict(name) => {
                ApiError::conflict(format!("Tenant '{}' already exists", name))
            }
            crate::services::tenant_directory::DirectoryError::Database(e) => {
                tracing::error!("Tenant directory error: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::services::backfill::BackfillError> for ApiError {
    fn from(err: crate::services::backfill::BackfillError) -> Self {
        match err {
            crate::services::backfill::BackfillError::NotTenantOwned(table) => {
                ApiError::bad_request(format!("Table '{}' is not tenant-owned", table))
            }
            crate::services::backfill::BackfillError::Query(e) => ApiError::from(e),
        }
    }
}

impl From<crate::session::SessionError> for ApiError {
    fn from(err: crate::session::SessionError) -> Self {
        match err {
            crate::session::SessionError::NotFound(_) => {
                ApiError::unauthenticated("Session is no longer valid")
            }
            crate::session::SessionError::Database(e) => {
                tracing::error!("Session store error: {}", e);
                ApiError::internal_server_error("Failed to load session state")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
