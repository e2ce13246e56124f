pub mod backfill;
pub mod impersonation;
pub mod tenant_directory;

pub use impersonation::ImpersonationService;
pub use tenant_directory::{PgTenantDirectory, TenantDirectory};
