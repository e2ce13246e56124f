use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Descriptor for a tenant-owned table: which column carries the owning
/// tenant's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    pub tenant_column: &'static str,
}

/// Manual allow-list of every tenant-owned table in the shared database.
///
/// This is an explicit, reviewable artifact: adding a tenant-owned table to
/// the schema without registering it here leaves that table unscoped, which
/// the registry-completeness test in `scoped.rs` exists to catch. Tables
/// absent from the list are tenant-agnostic by contract: the tenant catalog
/// itself, and the user/session/audit bookkeeping keyed by user rather than
/// tenant.
static TENANT_TABLES: Lazy<HashMap<&'static str, TableDescriptor>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("customers", TableDescriptor { tenant_column: "tenant_id" });
    m.insert("appointments", TableDescriptor { tenant_column: "tenant_id" });
    m.insert("services", TableDescriptor { tenant_column: "tenant_id" });
    m.insert("staff", TableDescriptor { tenant_column: "tenant_id" });
    m.insert("messages", TableDescriptor { tenant_column: "tenant_id" });
    m.insert("invoices", TableDescriptor { tenant_column: "tenant_id" });
    m.insert("payments", TableDescriptor { tenant_column: "tenant_id" });
    m.insert("campaigns", TableDescriptor { tenant_column: "tenant_id" });
    m
});

/// Look up the descriptor for a table. `None` means tenant-agnostic.
pub fn describe(table: &str) -> Option<&'static TableDescriptor> {
    TENANT_TABLES.get(table)
}

/// Shorthand for the tenant-owner column of a registered table.
pub fn tenant_column(table: &str) -> Option<&'static str> {
    describe(table).map(|d| d.tenant_column)
}

/// All registered tenant-owned table names, for admin routing and the
/// completeness regression test.
pub fn registered_tables() -> impl Iterator<Item = &'static str> {
    TENANT_TABLES.keys().copied()
}

pub fn is_registered(table: &str) -> bool {
    TENANT_TABLES.contains_key(table)
}
