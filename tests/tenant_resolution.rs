mod common;

use uuid::Uuid;

use bookable_api::auth::role::Role;
use bookable_api::context::{resolve_effective_tenant, ResolveError, TenantSource};
use bookable_api::session::SessionState;

use common::{auth_user, make_tenant, MemoryTenantDirectory};

#[tokio::test]
async fn resolution_fails_closed_on_dangling_impersonation_target() {
    // The session carries an override, but the tenant behind it has been
    // deleted. The request must die with a resolution error, not fall back
    // to some other tenant and certainly not to "no restriction".
    let root = make_tenant("platform", None, true);
    let directory = MemoryTenantDirectory::with_tenants(vec![root.clone()]);

    let missing = Uuid::new_v4();
    let session = SessionState {
        impersonating_tenant_id: Some(missing),
        impersonation_started_at: Some(chrono::Utc::now()),
    };
    let owner = auth_user(Uuid::new_v4(), root.id, Role::Owner);

    let err = resolve_effective_tenant(&session, Some(&owner), &directory)
        .await
        .unwrap_err();
    match err {
        ResolveError::UnknownTenant(id) => assert_eq!(id, missing),
        other => panic!("expected UnknownTenant, got {other:?}"),
    }
}

#[tokio::test]
async fn resolution_fails_closed_when_no_root_tenant_exists() {
    // Unauthenticated requests resolve to the root fallback. A directory
    // without a root tenant is a deployment error and must surface as one.
    let salon = make_tenant("Salon Aurora", Some("aurora"), false);
    let directory = MemoryTenantDirectory::with_tenants(vec![salon]);

    let err = resolve_effective_tenant(&SessionState::default(), None, &directory)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::UnknownTenant(id) if id.is_nil()));
}

#[tokio::test]
async fn resolution_loads_caller_tenant_when_no_override() {
    let salon = make_tenant("Salon Aurora", Some("aurora"), false);
    let directory = MemoryTenantDirectory::with_tenants(vec![salon.clone()]);

    let staff = auth_user(Uuid::new_v4(), salon.id, Role::Employee);
    let ctx = resolve_effective_tenant(&SessionState::default(), Some(&staff), &directory)
        .await
        .unwrap();
    assert_eq!(ctx.id, salon.id);
    assert_eq!(ctx.source, TenantSource::Caller);
    assert!(!ctx.is_root);
}
