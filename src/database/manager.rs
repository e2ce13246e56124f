use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection manager for the single shared, tenant-agnostic database.
///
/// Every tenant's rows live in this one database; isolation is enforced per
/// row by the scoped facade, not per connection. The pool itself carries no
/// tenant identity.
pub struct DatabaseManager;

static POOL: OnceCell<PgPool> = OnceCell::const_new();

impl DatabaseManager {
    /// Get the shared pool, creating it lazily on first use.
    pub async fn pool() -> Result<PgPool, DatabaseError> {
        let pool = POOL
            .get_or_try_init(|| async {
                let connection_string = Self::connection_string()?;
                let cfg = &crate::config::config().database;
                let pool = PgPoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .acquire_timeout(Duration::from_secs(cfg.connection_timeout_secs))
                    .connect(&connection_string)
                    .await?;
                info!("Created shared database pool");
                Ok::<PgPool, DatabaseError>(pool)
            })
            .await?;
        Ok(pool.clone())
    }

    fn connection_string() -> Result<String, DatabaseError> {
        let base = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        // Parse up front so a malformed URL fails at startup, not mid-request
        let url = url::Url::parse(&base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        Ok(url.into())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }
}
