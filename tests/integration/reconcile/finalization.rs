//! Finalization of deleted accounts

use super::common::{account, Failure, FakeStore, Harness, NAME, NAMESPACE};
use aqua_scanner_account_controller::controller::reconciler::{
    has_finalizer, PassOutcome, ReconcilerError,
};
use aqua_scanner_account_controller::crd::AccountState;

const ALL_DELETES: [&str; 4] = [
    "delete_user",
    "delete_role",
    "delete_application_scope",
    "delete_permission_set",
];

#[tokio::test]
async fn test_deletion_mid_provisioning_removes_every_object() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.provider.fail("create_role", Failure::Rejected);
    assert!(matches!(
        harness.reconciler.reconcile_pass(NAMESPACE, NAME).await,
        Err(ReconcilerError::Provisioning { .. })
    ));

    harness.store.request_deletion();
    harness.provider.clear_calls();

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Finalized);
    assert_eq!(harness.provider.calls(), ALL_DELETES);
    assert!(harness.store.account().is_none());
}

#[tokio::test]
async fn test_complete_account_is_finalized() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    harness.store.request_deletion();
    harness.provider.clear_calls();

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Finalized);
    assert_eq!(harness.provider.calls(), ALL_DELETES);
}

#[tokio::test]
async fn test_failed_delete_keeps_finalizer_and_attempts_the_rest() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    harness.store.request_deletion();
    harness.provider.clear_calls();
    harness.provider.fail("delete_role", Failure::Rejected);

    let result = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await;
    assert!(matches!(result, Err(ReconcilerError::Finalization(_))));
    assert_eq!(harness.provider.calls(), ALL_DELETES);

    let stored = harness.store.account().unwrap();
    assert!(has_finalizer(&stored));
    let status = stored.status.unwrap();
    assert_eq!(status.state, Some(AccountState::Failed));
    assert!(status.message.unwrap().contains("Failed to delete Role"));

    harness.provider.recover("delete_role");
    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Finalized);
    assert!(harness.store.account().is_none());
}

#[tokio::test]
async fn test_deleted_account_without_status_is_finalized() {
    let mut deleted = account(NAMESPACE);
    deleted.metadata.finalizers = Some(vec!["mamoa.devops.gov.bc.ca/finalizer".to_string()]);
    let harness = Harness::new(FakeStore::new(deleted));
    harness.store.request_deletion();

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Finalized);
    assert_eq!(harness.provider.calls(), ALL_DELETES);
    assert!(harness.store.account().is_none());
}

#[tokio::test]
async fn test_refused_login_during_finalization_is_recorded() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    harness.store.request_deletion();
    harness.provider.fail("delete_user", Failure::LoginRefused);

    let result = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await;
    assert!(matches!(result, Err(ReconcilerError::Finalization(_))));
    assert!(harness.login_health.broken_endpoint().is_some());
    assert!(has_finalizer(&harness.store.account().unwrap()));
}
