mod common;

use uuid::Uuid;

use bookable_api::auth::role::{require_role, Role};
use bookable_api::context::{effective_tenant_id, TenantSource};
use bookable_api::database::models::ImpersonationAction;
use bookable_api::error::ApiError;
use bookable_api::services::impersonation::ImpersonationError;
use bookable_api::session::SessionStore;

use common::{auth_user, harness, make_tenant};

#[tokio::test]
async fn start_records_durable_state_and_one_event() {
    let root = make_tenant("platform", None, true);
    let salon = make_tenant("Salon Aurora", Some("aurora"), false);
    let target = salon.id;
    let h = harness(vec![root.clone(), salon]);

    let session_id = h.sessions.create(Uuid::new_v4()).await.unwrap();
    let owner = auth_user(session_id, root.id, Role::Owner);

    let grant = h.service.start(&owner, target, "10.0.0.1").await.unwrap();
    assert_eq!(grant.tenant_id, target);
    assert_eq!(grant.tenant_name, "Salon Aurora");

    // State survives a reload through the store, not just in memory
    let state = h.sessions.load(session_id).await.unwrap();
    assert_eq!(state.impersonating_tenant_id, Some(target));
    assert!(state.impersonation_started_at.is_some());

    let events = h.audit.recorded();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, ImpersonationAction::Start);
    assert_eq!(events[0].tenant_id, target);
    assert_eq!(events[0].real_user_id, owner.user_id);
    assert_eq!(events[0].origin, "10.0.0.1");
}

#[tokio::test]
async fn start_against_unknown_tenant_changes_nothing() {
    let root = make_tenant("platform", None, true);
    let h = harness(vec![root.clone()]);

    let session_id = h.sessions.create(Uuid::new_v4()).await.unwrap();
    let owner = auth_user(session_id, root.id, Role::Owner);
    let missing = Uuid::new_v4();

    let err = h.service.start(&owner, missing, "cli").await.unwrap_err();
    assert!(matches!(err, ImpersonationError::TenantNotFound(id) if id == missing));

    let state = h.sessions.load(session_id).await.unwrap();
    assert!(!state.is_impersonating());
    assert!(h.audit.recorded().is_empty());
}

#[tokio::test]
async fn stop_is_idempotent_and_emits_no_event_when_inactive() {
    let root = make_tenant("platform", None, true);
    let h = harness(vec![root.clone()]);

    let session_id = h.sessions.create(Uuid::new_v4()).await.unwrap();
    let owner = auth_user(session_id, root.id, Role::Owner);

    h.service.stop(&owner, "cli").await.unwrap();
    h.service.stop(&owner, "cli").await.unwrap();

    assert!(h.audit.recorded().is_empty());
}

#[tokio::test]
async fn stop_after_start_emits_matched_event_pair() {
    let root = make_tenant("platform", None, true);
    let salon = make_tenant("Barber North", Some("north"), false);
    let target = salon.id;
    let h = harness(vec![root.clone(), salon]);

    let session_id = h.sessions.create(Uuid::new_v4()).await.unwrap();
    let owner = auth_user(session_id, root.id, Role::Owner);

    h.service.start(&owner, target, "cli").await.unwrap();
    h.service.stop(&owner, "cli").await.unwrap();
    // Second stop after the session is already clean: no extra event
    h.service.stop(&owner, "cli").await.unwrap();

    let state = h.sessions.load(session_id).await.unwrap();
    assert!(!state.is_impersonating());
    assert!(state.impersonation_started_at.is_none());

    let events = h.audit.recorded();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, ImpersonationAction::Start);
    assert_eq!(events[1].action, ImpersonationAction::Stop);
    assert_eq!(events[1].tenant_id, target);
}

#[tokio::test]
async fn audit_outage_does_not_reverse_the_transition() {
    let root = make_tenant("platform", None, true);
    let salon = make_tenant("Studio B", Some("studiob"), false);
    let target = salon.id;
    let h = harness(vec![root.clone(), salon]);

    let session_id = h.sessions.create(Uuid::new_v4()).await.unwrap();
    let owner = auth_user(session_id, root.id, Role::Owner);

    h.audit.set_failing(true);
    h.service.start(&owner, target, "cli").await.unwrap();

    // The override is live even though no event landed
    let state = h.sessions.load(session_id).await.unwrap();
    assert_eq!(state.impersonating_tenant_id, Some(target));
    assert!(h.audit.recorded().is_empty());
}

#[tokio::test]
async fn impersonation_never_raises_privileges() {
    let root = make_tenant("platform", None, true);
    let salon = make_tenant("Clinic East", Some("east"), false);
    let target = salon.id;
    let h = harness(vec![root.clone(), salon]);

    let session_id = h.sessions.create(Uuid::new_v4()).await.unwrap();
    let owner = auth_user(session_id, root.id, Role::Owner);

    h.service.start(&owner, target, "cli").await.unwrap();
    let session = h.sessions.load(session_id).await.unwrap();

    // Scoping follows the borrowed tenant
    let (effective, source) = effective_tenant_id(&session, Some(&owner));
    assert_eq!(effective, Some(target));
    assert_eq!(source, TenantSource::Impersonation);

    // Privileges stay the operator's own: tenant-level floors still pass,
    // owner-floor operations are refused for the duration
    assert!(require_role(Some(&owner), &session, Role::Manager).is_ok());
    let err = require_role(Some(&owner), &session, Role::Owner).unwrap_err();
    assert_eq!(err.error_code(), "IMPERSONATION_FORBIDDEN");

    // Which also means a second start cannot be gated through
    assert!(matches!(
        require_role(Some(&owner), &session, Role::Owner),
        Err(ApiError::ImpersonationForbidden(_))
    ));
}

#[tokio::test]
async fn whole_lifecycle_keeps_context_endpoint_consistent() {
    let root = make_tenant("platform", None, true);
    let salon = make_tenant("Gym West", Some("west"), false);
    let target = salon.id;
    let h = harness(vec![root.clone(), salon]);

    let session_id = h.sessions.create(Uuid::new_v4()).await.unwrap();
    let owner = auth_user(session_id, root.id, Role::Owner);

    let before = h.service.context(&owner).await.unwrap();
    assert!(!before.is_impersonating);
    assert_eq!(before.tenant_id, None);

    h.service.start(&owner, target, "cli").await.unwrap();
    let during = h.service.context(&owner).await.unwrap();
    assert!(during.is_impersonating);
    assert_eq!(during.tenant_id, Some(target));
    assert!(during.started_at.is_some());

    h.service.stop(&owner, "cli").await.unwrap();
    let after = h.service.context(&owner).await.unwrap();
    assert!(!after.is_impersonating);
    assert_eq!(after.tenant_id, None);
}
