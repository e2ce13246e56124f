use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgArguments;
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

use crate::database::registry;
use crate::filter::error::FilterError;
use crate::filter::{Filter, FilterData, SqlResult};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Invalid values: {0}")]
    InvalidValues(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Per-request data access facade bound to exactly one tenant.
///
/// Wraps the shared, tenant-agnostic pool and confines every verb to the
/// bound tenant's rows via the table registry:
///
/// - `insert` stamps the tenant column onto every row, overwriting anything
///   the caller supplied;
/// - `update`/`delete` AND the tenant predicate into the WHERE clause at SQL
///   assembly, so an execution with no caller predicate is still scoped to
///   the bound tenant rather than running against the whole table;
/// - `select` injects the tenant predicate ahead of the caller's filter;
/// - ad-hoc SQL goes through `execute`, and callers there must compose
///   `tenant_predicate` into their own statement; the facade cannot rewrite
///   arbitrary joins safely.
///
/// Unregistered tables pass through unmodified on every verb; that is the
/// documented contract for intentionally-global tables, not an error.
///
/// The facade holds no cross-request state. Execution methods accept any
/// Postgres executor, so multi-step consistency is the caller's transaction:
/// `db.pool().begin()`, run several facade calls against `&mut *tx`, commit.
#[derive(Clone)]
pub struct ScopedDb {
    pool: sqlx::PgPool,
    tenant_id: Uuid,
}

impl ScopedDb {
    pub fn new(pool: sqlx::PgPool, tenant_id: Uuid) -> Self {
        Self { pool, tenant_id }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// The underlying pool, for beginning ambient transactions. Data access
    /// through the raw pool belongs in `UnscopedDb`, not here.
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    /// Single-table read with the tenant predicate injected ahead of the
    /// caller's filter.
    pub fn select(&self, table: &str, data: FilterData) -> Result<SelectQuery, QueryError> {
        let mut filter = Filter::new(table)?;
        if let Some(column) = registry::tenant_column(table) {
            filter.mandatory_eq(column, Value::String(self.tenant_id.to_string()))?;
        }
        filter.assign(data)?;
        Ok(SelectQuery { filter })
    }

    /// Insert one row (object) or several (array of objects). For registered
    /// tables the tenant column is overwritten on every row; a forged or
    /// stale tenant id in the payload never survives.
    pub fn insert(&self, table: &str, values: Value) -> Result<InsertQuery, QueryError> {
        // Reuse filter-side identifier validation
        Filter::new(table)?;

        let mut rows = normalize_rows(values)?;
        if let Some(column) = registry::tenant_column(table) {
            for row in rows.iter_mut() {
                row.insert(column.to_string(), Value::String(self.tenant_id.to_string()));
            }
        }

        let first = rows
            .first()
            .ok_or_else(|| QueryError::InvalidValues("Insert requires at least one row".to_string()))?;
        let columns: Vec<String> = first.keys().cloned().collect();
        for column in &columns {
            crate::filter::filter_where::FilterWhere::validate_column_name(column)?;
        }
        for row in &rows {
            if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(c)) {
                return Err(QueryError::InvalidValues(
                    "All rows in a batch insert must have the same columns".to_string(),
                ));
            }
        }

        Ok(InsertQuery { table: table.to_string(), columns, rows })
    }

    /// Update builder. The caller's predicate is optional; the tenant
    /// predicate is not.
    pub fn update(&self, table: &str, values: Value) -> Result<UpdateQuery, QueryError> {
        Filter::new(table)?;

        let mut set = match values {
            Value::Object(map) => map,
            other => {
                return Err(QueryError::InvalidValues(format!(
                    "Update values must be an object, got {}",
                    value_kind(&other)
                )))
            }
        };
        if set.is_empty() {
            return Err(QueryError::InvalidValues("Update requires at least one column".to_string()));
        }

        let tenant = registry::tenant_column(table).map(|c| (c, self.tenant_id));
        // A row can never be moved across tenants through the facade
        if let Some((column, id)) = tenant {
            if set.contains_key(column) {
                set.insert(column.to_string(), Value::String(id.to_string()));
            }
        }
        for column in set.keys() {
            crate::filter::filter_where::FilterWhere::validate_column_name(column)?;
        }

        Ok(UpdateQuery { table: table.to_string(), tenant, set, where_data: None })
    }

    /// Delete builder, tenant-scoped the same way as `update`.
    pub fn delete(&self, table: &str) -> Result<DeleteQuery, QueryError> {
        Filter::new(table)?;
        let tenant = registry::tenant_column(table).map(|c| (c, self.tenant_id));
        Ok(DeleteQuery { table: table.to_string(), tenant, where_data: None })
    }

    /// Build the tenant predicate for a table, for callers composing their
    /// own SQL (joins, subqueries). Unregistered tables return the extra
    /// condition unchanged. The extra fragment's placeholders are numbered
    /// from $1 and get shifted past the tenant parameter.
    pub fn tenant_predicate(&self, table: &str, extra: Option<SqlResult>) -> SqlResult {
        let Some(column) = registry::tenant_column(table) else {
            return extra.unwrap_or_else(SqlResult::empty);
        };

        let mut params = vec![Value::String(self.tenant_id.to_string())];
        let query = match extra {
            Some(extra) if !extra.query.is_empty() => {
                let shifted = shift_placeholders(&extra.query, 1);
                params.extend(extra.params);
                format!("\"{}\" = $1 AND ({})", column, shifted)
            }
            _ => format!("\"{}\" = $1", column),
        };
        SqlResult { query, params }
    }

    /// Raw parameterized passthrough. No tenant predicate is injected here;
    /// callers combine `tenant_predicate` into the statement themselves.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, QueryError> {
        let mut q = sqlx::query(sql);
        for p in &params {
            q = bind_param(q, p.clone())?;
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Raw parameterized read, rows as JSON objects. Same contract as
    /// `execute`: scoping is the caller's responsibility via
    /// `tenant_predicate`.
    pub async fn fetch(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Value>, QueryError> {
        let wrapped = format!("SELECT row_to_json(t) AS row FROM ({}) t", sql);
        let mut q = sqlx::query(&wrapped);
        for p in &params {
            q = bind_param(q, p.clone())?;
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| r.try_get::<Value, _>("row").map_err(QueryError::from))
            .collect()
    }
}

/// Assembled single-table read.
#[derive(Debug)]
pub struct SelectQuery {
    filter: Filter,
}

impl SelectQuery {
    pub fn to_sql(&self) -> Result<SqlResult, QueryError> {
        Ok(self.filter.to_sql()?)
    }

    pub async fn fetch_all<'e, E>(self, executor: E) -> Result<Vec<Value>, QueryError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = self.to_sql()?;
        let wrapped = format!("SELECT row_to_json(t) AS row FROM ({}) t", sql.query);
        let mut q = sqlx::query(&wrapped);
        for p in &sql.params {
            q = bind_param(q, p.clone())?;
        }
        let rows = q.fetch_all(executor).await?;
        rows.iter()
            .map(|r| r.try_get::<Value, _>("row").map_err(QueryError::from))
            .collect()
    }

    pub async fn fetch_optional<'e, E>(self, executor: E) -> Result<Option<Value>, QueryError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = self.to_sql()?;
        let wrapped = format!("SELECT row_to_json(t) AS row FROM ({}) t", sql.query);
        let mut q = sqlx::query(&wrapped);
        for p in &sql.params {
            q = bind_param(q, p.clone())?;
        }
        let row = q.fetch_optional(executor).await?;
        row.map(|r| r.try_get::<Value, _>("row").map_err(QueryError::from))
            .transpose()
    }
}

/// Assembled insert with tenant-stamped rows.
#[derive(Debug)]
pub struct InsertQuery {
    table: String,
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

impl InsertQuery {
    /// The rows as they will be written, tenant column already stamped.
    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    pub fn to_sql(&self) -> SqlResult {
        let quoted: Vec<String> = self.columns.iter().map(|c| format!("\"{}\"", c)).collect();
        let mut params = Vec::with_capacity(self.rows.len() * self.columns.len());
        let mut tuples = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut placeholders = Vec::with_capacity(self.columns.len());
            for column in &self.columns {
                params.push(row.get(column).cloned().unwrap_or(Value::Null));
                placeholders.push(format!("${}", params.len()));
            }
            tuples.push(format!("({})", placeholders.join(", ")));
        }
        let query = format!(
            "INSERT INTO \"{}\" ({}) VALUES {}",
            self.table,
            quoted.join(", "),
            tuples.join(", ")
        );
        SqlResult { query, params }
    }

    pub async fn execute<'e, E>(self, executor: E) -> Result<u64, QueryError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = self.to_sql();
        let mut q = sqlx::query(&sql.query);
        for p in &sql.params {
            q = bind_param(q, p.clone())?;
        }
        let result = q.execute(executor).await?;
        Ok(result.rows_affected())
    }

    /// Execute and return the created rows as JSON objects.
    pub async fn fetch_created<'e, E>(self, executor: E) -> Result<Vec<Value>, QueryError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let table = self.table.clone();
        let sql = self.to_sql();
        let query = format!("{} RETURNING to_jsonb(\"{}\") AS row", sql.query, table);
        let mut q = sqlx::query(&query);
        for p in &sql.params {
            q = bind_param(q, p.clone())?;
        }
        let rows = q.fetch_all(executor).await?;
        rows.iter()
            .map(|r| r.try_get::<Value, _>("row").map_err(QueryError::from))
            .collect()
    }
}

/// Update builder. `filter` is optional; executing without it still applies
/// the tenant predicate: "forgot to filter" degrades to "scoped to the
/// bound tenant", never to "affects every tenant's rows".
#[derive(Debug)]
pub struct UpdateQuery {
    table: String,
    tenant: Option<(&'static str, Uuid)>,
    set: Map<String, Value>,
    where_data: Option<Value>,
}

impl UpdateQuery {
    pub fn filter(mut self, conditions: Value) -> Result<Self, QueryError> {
        crate::filter::filter_where::FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, QueryError> {
        let mut params: Vec<Value> = Vec::with_capacity(self.set.len() + 2);
        let mut assignments = Vec::with_capacity(self.set.len());
        for (column, value) in &self.set {
            params.push(value.clone());
            assignments.push(format!("\"{}\" = ${}", column, params.len()));
        }

        let where_clause = build_scoped_where(&self.tenant, &self.where_data, &mut params)?;
        let query = match where_clause {
            Some(clause) => format!(
                "UPDATE \"{}\" SET {} WHERE {}",
                self.table,
                assignments.join(", "),
                clause
            ),
            None => format!("UPDATE \"{}\" SET {}", self.table, assignments.join(", ")),
        };
        Ok(SqlResult { query, params })
    }

    pub async fn execute<'e, E>(self, executor: E) -> Result<u64, QueryError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = self.to_sql()?;
        let mut q = sqlx::query(&sql.query);
        for p in &sql.params {
            q = bind_param(q, p.clone())?;
        }
        let result = q.execute(executor).await?;
        Ok(result.rows_affected())
    }
}

/// Delete builder with the same lazy-predicate guarantee as `UpdateQuery`.
#[derive(Debug)]
pub struct DeleteQuery {
    table: String,
    tenant: Option<(&'static str, Uuid)>,
    where_data: Option<Value>,
}

impl DeleteQuery {
    pub fn filter(mut self, conditions: Value) -> Result<Self, QueryError> {
        crate::filter::filter_where::FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, QueryError> {
        let mut params: Vec<Value> = Vec::new();
        let where_clause = build_scoped_where(&self.tenant, &self.where_data, &mut params)?;
        let query = match where_clause {
            Some(clause) => format!("DELETE FROM \"{}\" WHERE {}", self.table, clause),
            None => format!("DELETE FROM \"{}\"", self.table),
        };
        Ok(SqlResult { query, params })
    }

    pub async fn execute<'e, E>(self, executor: E) -> Result<u64, QueryError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = self.to_sql()?;
        let mut q = sqlx::query(&sql.query);
        for p in &sql.params {
            q = bind_param(q, p.clone())?;
        }
        let result = q.execute(executor).await?;
        Ok(result.rows_affected())
    }
}

/// Combine the tenant predicate (when the table is registered) with the
/// caller's optional conditions. Returns `None` only when there is neither,
/// which can only happen for unregistered tables.
fn build_scoped_where(
    tenant: &Option<(&'static str, Uuid)>,
    where_data: &Option<Value>,
    params: &mut Vec<Value>,
) -> Result<Option<String>, QueryError> {
    let mut parts: Vec<String> = vec![];

    if let Some((column, id)) = tenant {
        params.push(Value::String(id.to_string()));
        parts.push(format!("\"{}\" = ${}", column, params.len()));
    }

    if let Some(where_data) = where_data {
        let (clause, caller_params) =
            crate::filter::filter_where::FilterWhere::generate(where_data, params.len())
                .map_err(QueryError::Filter)?;
        if !clause.is_empty() {
            if parts.is_empty() {
                parts.push(clause);
            } else {
                parts.push(format!("({})", clause));
            }
            params.extend(caller_params);
        }
    }

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join(" AND ")))
    }
}

fn normalize_rows(values: Value) -> Result<Vec<Map<String, Value>>, QueryError> {
    match values {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => {
            let mut rows = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => rows.push(map),
                    other => {
                        return Err(QueryError::InvalidValues(format!(
                            "Insert rows must be objects, got {}",
                            value_kind(&other)
                        )))
                    }
                }
            }
            Ok(rows)
        }
        other => Err(QueryError::InvalidValues(format!(
            "Insert values must be an object or array of objects, got {}",
            value_kind(&other)
        ))),
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renumber `$n` placeholders in a fragment by `by`, so a caller-built
/// fragment numbered from $1 can be appended after already-bound parameters.
pub fn shift_placeholders(sql: &str, by: usize) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().map(|n| n.is_ascii_digit()).unwrap_or(false) {
            let mut digits = String::new();
            while let Some(n) = chars.peek() {
                if n.is_ascii_digit() {
                    digits.push(*n);
                    chars.next();
                } else {
                    break;
                }
            }
            match digits.parse::<usize>() {
                Ok(idx) => {
                    out.push('$');
                    out.push_str(&(idx + by).to_string());
                }
                Err(_) => {
                    out.push('$');
                    out.push_str(&digits);
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Bind a JSON parameter with type recovery for the column types the
/// platform uses: uuid-shaped and RFC 3339-shaped strings are bound as their
/// native Postgres types, everything else binds as its JSON scalar.
///
/// Integers that do not fit Postgres bigint are rejected rather than
/// wrapped.
pub(crate) fn bind_param(
    q: sqlx::query::Query<'_, sqlx::Postgres, PgArguments>,
    v: Value,
) -> Result<sqlx::query::Query<'_, sqlx::Postgres, PgArguments>, QueryError> {
    Ok(match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if n.as_u64().is_some() {
                return Err(QueryError::InvalidValues(format!(
                    "Integer {} is out of range for a bigint column",
                    n
                )));
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => {
            if let Ok(id) = Uuid::parse_str(&s) {
                q.bind(id)
            } else if let Ok(ts) = DateTime::parse_from_rfc3339(&s) {
                q.bind(ts.with_timezone(&Utc))
            } else {
                q.bind(s)
            }
        }
        Value::Array(_) | Value::Object(_) => q.bind(v), // JSONB
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn facade(tenant: Uuid) -> ScopedDb {
        // Lazy pool: never connects unless a query executes, so SQL-assembly
        // tests stay hermetic. Pool construction still spawns maintenance
        // tasks, so callers run under the Tokio test runtime.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/bookable_test")
            .expect("lazy pool");
        ScopedDb::new(pool, tenant)
    }

    fn tenant_a() -> Uuid {
        Uuid::parse_str("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa").unwrap()
    }

    fn tenant_b() -> Uuid {
        Uuid::parse_str("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb").unwrap()
    }

    #[tokio::test]
    async fn insert_stamps_tenant_column() {
        let db = facade(tenant_a());
        let q = db.insert("customers", json!({"name": "Jane"})).unwrap();
        assert_eq!(q.rows()[0]["tenant_id"], json!(tenant_a().to_string()));
    }

    #[tokio::test]
    async fn insert_overwrites_forged_tenant_id() {
        // Payload claims tenant B; facade is bound to A. The stored row must
        // belong to A.
        let db = facade(tenant_a());
        let q = db
            .insert("customers", json!({"name": "Jane", "tenant_id": tenant_b().to_string()}))
            .unwrap();
        assert_eq!(q.rows()[0]["tenant_id"], json!(tenant_a().to_string()));
    }

    #[tokio::test]
    async fn batch_insert_stamps_every_row() {
        let db = facade(tenant_a());
        let q = db
            .insert(
                "messages",
                json!([
                    {"body": "hi", "tenant_id": tenant_b().to_string()},
                    {"body": "bye"}
                ]),
            )
            .unwrap();
        assert_eq!(q.rows().len(), 2);
        for row in q.rows() {
            assert_eq!(row["tenant_id"], json!(tenant_a().to_string()));
        }
    }

    #[tokio::test]
    async fn batch_insert_requires_uniform_columns() {
        let db = facade(tenant_a());
        let err = db
            .insert("messages", json!([{"body": "hi"}, {"subject": "x"}]))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidValues(_)));
    }

    #[tokio::test]
    async fn insert_sql_lists_stamped_column() {
        let db = facade(tenant_a());
        let sql = db.insert("customers", json!({"name": "Jane"})).unwrap().to_sql();
        assert!(sql.query.starts_with("INSERT INTO \"customers\""));
        assert!(sql.query.contains("\"tenant_id\""));
        assert!(sql.params.contains(&json!(tenant_a().to_string())));
    }

    #[tokio::test]
    async fn update_without_filter_is_still_scoped() {
        // The single highest-value guarantee: no .filter() call, the
        // statement must still carry the tenant predicate.
        let db = facade(tenant_a());
        let sql = db
            .update("customers", json!({"name": "Janet"}))
            .unwrap()
            .to_sql()
            .unwrap();
        assert_eq!(
            sql.query,
            "UPDATE \"customers\" SET \"name\" = $1 WHERE \"tenant_id\" = $2"
        );
        assert_eq!(sql.params, vec![json!("Janet"), json!(tenant_a().to_string())]);
    }

    #[tokio::test]
    async fn update_with_filter_ands_tenant_predicate() {
        let db = facade(tenant_a());
        let sql = db
            .update("customers", json!({"name": "Janet"}))
            .unwrap()
            .filter(json!({"email": "jane@example.com"}))
            .unwrap()
            .to_sql()
            .unwrap();
        assert_eq!(
            sql.query,
            "UPDATE \"customers\" SET \"name\" = $1 WHERE \"tenant_id\" = $2 AND (\"email\" = $3)"
        );
    }

    #[tokio::test]
    async fn update_cannot_move_row_across_tenants() {
        let db = facade(tenant_a());
        let sql = db
            .update("customers", json!({"tenant_id": tenant_b().to_string(), "name": "Janet"}))
            .unwrap()
            .to_sql()
            .unwrap();
        // The SET value for tenant_id is rewritten to the bound tenant
        assert!(sql.params.contains(&json!(tenant_a().to_string())));
        assert!(!sql.params.contains(&json!(tenant_b().to_string())));
    }

    #[tokio::test]
    async fn delete_without_filter_is_still_scoped() {
        let db = facade(tenant_a());
        let sql = db.delete("appointments").unwrap().to_sql().unwrap();
        assert_eq!(sql.query, "DELETE FROM \"appointments\" WHERE \"tenant_id\" = $1");
        assert_eq!(sql.params, vec![json!(tenant_a().to_string())]);
    }

    #[tokio::test]
    async fn delete_with_filter_ands_tenant_predicate() {
        let db = facade(tenant_a());
        let sql = db
            .delete("appointments")
            .unwrap()
            .filter(json!({"status": "canceled"}))
            .unwrap()
            .to_sql()
            .unwrap();
        assert_eq!(
            sql.query,
            "DELETE FROM \"appointments\" WHERE \"tenant_id\" = $1 AND (\"status\" = $2)"
        );
    }

    #[tokio::test]
    async fn select_injects_tenant_predicate() {
        let db = facade(tenant_a());
        let sql = db
            .select(
                "customers",
                FilterData {
                    where_clause: Some(json!({"name": "Jane"})),
                    ..Default::default()
                },
            )
            .unwrap()
            .to_sql()
            .unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"customers\" WHERE \"tenant_id\" = $1 AND (\"name\" = $2)"
        );
        assert_eq!(sql.params[0], json!(tenant_a().to_string()));
    }

    #[tokio::test]
    async fn unregistered_table_passes_through_unchanged() {
        // Silent pass-through is the documented contract for global tables.
        let db = facade(tenant_a());

        let sql = db.select("tenants", FilterData::default()).unwrap().to_sql().unwrap();
        assert_eq!(sql.query, "SELECT * FROM \"tenants\"");
        assert!(sql.params.is_empty());

        let insert = db.insert("tenants", json!({"name": "acme"})).unwrap();
        assert!(insert.rows()[0].get("tenant_id").is_none());

        let update = db
            .update("sessions", json!({"impersonating_tenant_id": null}))
            .unwrap()
            .to_sql()
            .unwrap();
        assert!(!update.query.contains("WHERE"));
    }

    #[tokio::test]
    async fn tenant_predicate_alone() {
        let db = facade(tenant_a());
        let pred = db.tenant_predicate("customers", None);
        assert_eq!(pred.query, "\"tenant_id\" = $1");
        assert_eq!(pred.params, vec![json!(tenant_a().to_string())]);
    }

    #[tokio::test]
    async fn tenant_predicate_shifts_extra_condition() {
        let db = facade(tenant_a());
        let extra = SqlResult {
            query: "\"status\" = $1 AND \"total\" > $2".to_string(),
            params: vec![json!("open"), json!(100)],
        };
        let pred = db.tenant_predicate("invoices", Some(extra));
        assert_eq!(
            pred.query,
            "\"tenant_id\" = $1 AND (\"status\" = $2 AND \"total\" > $3)"
        );
        assert_eq!(pred.params.len(), 3);
    }

    #[tokio::test]
    async fn tenant_predicate_unregistered_returns_extra_unchanged() {
        let db = facade(tenant_a());
        let extra = SqlResult { query: "\"user_id\" = $1".to_string(), params: vec![json!("u")] };
        let pred = db.tenant_predicate("sessions", Some(extra.clone()));
        assert_eq!(pred.query, extra.query);
        assert_eq!(pred.params, extra.params);

        let none = db.tenant_predicate("sessions", None);
        assert!(none.query.is_empty());
    }

    #[tokio::test]
    async fn registry_completeness_every_registered_table_stamps() {
        // Regression guard: a tenant-owned table whose insert does not stamp
        // the facade's tenant means the registry and the write path disagree.
        let db = facade(tenant_a());
        for table in crate::database::registry::registered_tables() {
            let q = db.insert(table, json!({"note": "probe"})).unwrap();
            let column = crate::database::registry::tenant_column(table).unwrap();
            assert_eq!(
                q.rows()[0][column],
                json!(tenant_a().to_string()),
                "table {} did not stamp its tenant column",
                table
            );
        }
    }

    #[tokio::test]
    async fn cross_tenant_scenario_jane_janet() {
        // Tenant A inserts a customer claiming tenant B: stored as A's row.
        let a = facade(tenant_a());
        let insert = a
            .insert("customers", json!({"name": "Jane", "tenant_id": tenant_b().to_string()}))
            .unwrap();
        assert_eq!(insert.rows()[0]["tenant_id"], json!(tenant_a().to_string()));

        // Tenant A then updates with no predicate at all: the statement is
        // confined to A's rows, so B's identically-named customer cannot be
        // touched.
        let update = a.update("customers", json!({"name": "Janet"})).unwrap().to_sql().unwrap();
        assert!(update.query.ends_with("WHERE \"tenant_id\" = $2"));
        assert_eq!(update.params[1], json!(tenant_a().to_string()));
        assert!(!update.params.contains(&json!(tenant_b().to_string())));
    }

    #[test]
    fn shift_placeholders_renumbers() {
        assert_eq!(shift_placeholders("\"a\" = $1 AND \"b\" = $2", 3), "\"a\" = $4 AND \"b\" = $5");
        assert_eq!(shift_placeholders("no placeholders", 2), "no placeholders");
        assert_eq!(shift_placeholders("\"p\" = $10", 1), "\"p\" = $11");
    }

    #[test]
    fn bind_param_rejects_integers_beyond_bigint() {
        let q = sqlx::query("SELECT 1");
        let err = match bind_param(q, json!(u64::MAX)) {
            Ok(_) => panic!("out-of-range integer was bound"),
            Err(e) => e,
        };
        assert!(matches!(err, QueryError::InvalidValues(_)));

        // i64::MAX itself still fits and binds.
        let q = sqlx::query("SELECT 1");
        assert!(bind_param(q, json!(i64::MAX)).is_ok());
    }
}
