use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::scoped::{bind_param, QueryError, ScopedDb};
use crate::filter::{Filter, FilterData};

/// Deliberately unscoped access to the shared database.
///
/// This is the escape hatch for the few legitimately cross-tenant
/// operations: subdomain-to-tenant login resolution, all-tenant enumeration
/// for owner tooling, and legacy backfill. Construction is explicit and the
/// type name is meant to stand out at every use site. If a route handler is
/// holding an `UnscopedDb`, that is a review flag.
///
/// Rule for writes: read globally if you must, but narrow to a specific
/// tenant before writing. `scoped_to` hands back a facade bound to that
/// tenant for exactly this purpose.
#[derive(Clone)]
pub struct UnscopedDb {
    pool: PgPool,
}

impl UnscopedDb {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Narrow to one tenant before performing writes.
    pub fn scoped_to(&self, tenant_id: Uuid) -> ScopedDb {
        ScopedDb::new(self.pool.clone(), tenant_id)
    }

    /// Cross-tenant single-table read. No tenant predicate is applied.
    pub async fn select(&self, table: &str, data: FilterData) -> Result<Vec<Value>, QueryError> {
        let mut filter = Filter::new(table)?;
        filter.assign(data)?;
        let sql = filter.to_sql()?;
        let wrapped = format!("SELECT row_to_json(t) AS row FROM ({}) t", sql.query);
        let mut q = sqlx::query(&wrapped);
        for p in &sql.params {
            q = bind_param(q, p.clone())?;
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| r.try_get::<Value, _>("row").map_err(QueryError::from))
            .collect()
    }
}
