use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use bookable_api::database::manager::DatabaseManager;
use bookable_api::handlers;
use bookable_api::middleware::auth::jwt_auth_middleware;
use bookable_api::middleware::context::tenant_context_middleware;
use bookable_api::middleware::credential_gate::credential_gate_middleware;
use bookable_api::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = bookable_api::config::config();
    tracing::info!("Starting Bookable API in {:?} mode", config.environment);

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to initialize database pool: {}", e);
            std::process::exit(1);
        }
    };

    let app = app(AppState::new(pool));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Bookable API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::public::root_info))
        .route("/health", get(handlers::public::health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::auth::login;

    Router::new().route("/auth/login/:subdomain", post(login::login))
}

/// Everything under /api runs behind the full request pipeline: JWT auth,
/// then tenant context resolution, then the credential rotation gate. The
/// ordering matters: the context layer needs the authenticated user, and
/// the gate needs both.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(data_routes())
        .merge(impersonation_routes())
        .merge(root_routes())
        .layer(from_fn(credential_gate_middleware))
        .layer(from_fn_with_state(state.clone(), tenant_context_middleware))
        .layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn auth_routes() -> Router<AppState> {
    use axum::routing::{delete, put};
    use handlers::auth::session;

    Router::new()
        .route("/api/auth/whoami", get(session::whoami))
        .route("/api/auth/session", delete(session::logout))
        .route("/api/auth/password", put(session::change_password))
}

fn data_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::data;

    Router::new()
        .route(
            "/api/data/:table",
            get(data::list)
                .post(data::create)
                .patch(data::update)
                .delete(data::destroy),
        )
        .route("/api/find/:table", post(data::find))
}

fn impersonation_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::impersonation;

    Router::new()
        .route(
            "/api/impersonate",
            get(impersonation::context).delete(impersonation::stop),
        )
        .route("/api/impersonate/:tenant_id", post(impersonation::start))
}

fn root_routes() -> Router<AppState> {
    use axum::routing::{get, post};
    use handlers::admin;

    Router::new()
        .route(
            "/api/root/tenants",
            get(admin::tenants::list).post(admin::tenants::create),
        )
        .route("/api/root/find/:table", post(admin::tenants::find_across_tenants))
        .route("/api/root/backfill/:table", post(admin::backfill::claim))
}
