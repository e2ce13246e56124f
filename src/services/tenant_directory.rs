use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::Tenant;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Tenant name conflict: {0}")]
    NameConflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Cross-tenant lookups over the global tenant catalog. This is, by nature,
/// escape-hatch territory: the catalog is tenant-agnostic and every method
/// here may see every tenant.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError>;
    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, DirectoryError>;
    /// The distinguished root tenant, also the fallback identity for
    /// unauthenticated paths.
    async fn root(&self) -> Result<Option<Tenant>, DirectoryError>;
    async fn list_all(&self) -> Result<Vec<Tenant>, DirectoryError>;
    async fn create(&self, name: &str, subdomain: Option<&str>) -> Result<Tenant, DirectoryError>;
}

pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TENANT_COLUMNS: &str = "id, name, subdomain, is_root, created_at, updated_at";

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE id = $1",
            TENANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, DirectoryError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE subdomain = $1",
            TENANT_COLUMNS
        ))
        .bind(subdomain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn root(&self) -> Result<Option<Tenant>, DirectoryError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE is_root = true LIMIT 1",
            TENANT_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn list_all(&self) -> Result<Vec<Tenant>, DirectoryError> {
        let tenants = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants ORDER BY created_at DESC",
            TENANT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(tenants)
    }

    async fn create(&self, name: &str, subdomain: Option<&str>) -> Result<Tenant, DirectoryError> {
        let result = sqlx::query_as::<_, Tenant>(&format!(
            "INSERT INTO tenants (name, subdomain, is_root) VALUES ($1, $2, false) RETURNING {}",
            TENANT_COLUMNS
        ))
        .bind(name)
        .bind(subdomain)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(tenant) => Ok(tenant),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(DirectoryError::NameConflict(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
