use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A row in the global `tenants` catalog. Identity is immutable once
/// created; the row is never deleted while owned data exists.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub subdomain: Option<String>,
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
