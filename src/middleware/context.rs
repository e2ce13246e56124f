use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::context::resolve_effective_tenant;
use crate::database::ScopedDb;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::session::SessionState;
use crate::state::AppState;

/// Builds the per-request tenant context and scoped facade.
///
/// Runs after JWT auth on protected routes. Session state (including any
/// impersonation override) is read once here; the resolved `TenantContext`
/// and a `ScopedDb` bound to it are injected as extensions, and handlers use
/// those exclusively for tenant-scoped persistence. Resolution failure is
/// terminal for the request; there is no unscoped fallback.
pub async fn tenant_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request.extensions().get::<AuthUser>().cloned();

    let session_state = match &auth_user {
        Some(user) => state.sessions.load(user.session_id).await?,
        None => SessionState::default(),
    };

    let tenant_context =
        resolve_effective_tenant(&session_state, auth_user.as_ref(), state.tenants.as_ref()).await?;

    tracing::debug!(
        tenant_id = %tenant_context.id,
        source = ?tenant_context.source,
        "tenant context resolved"
    );

    let scoped = ScopedDb::new(state.pool.clone(), tenant_context.id);

    request.extensions_mut().insert(session_state);
    request.extensions_mut().insert(tenant_context);
    request.extensions_mut().insert(scoped);

    Ok(next.run(request).await)
}
