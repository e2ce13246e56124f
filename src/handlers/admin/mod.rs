pub mod backfill;
pub mod tenants;
