//! Provisioning passes: fresh accounts, resumption after failures and terminal states

use super::common::{account, Failure, FakeStore, Harness, ACCOUNT_NAME, LOGIN_URL, NAME, NAMESPACE};
use aqua_scanner_account_controller::controller::password::PasswordPolicy;
use aqua_scanner_account_controller::controller::reconciler::{
    has_finalizer, reconcile, BackoffState, PassOutcome, ReconcilerError, ReconcilerSettings,
};
use aqua_scanner_account_controller::constants::DEFAULT_LOGIN_RECHECK_SECS;
use aqua_scanner_account_controller::crd::{
    AccountState, AquaObjectState, AquaScannerAccountStatus, ObjectState, SubResource,
};
use aqua_scanner_account_controller::provider::AccessError;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

const ALL_CREATES: [&str; 4] = [
    "create_application_scope",
    "create_permission_set",
    "create_role",
    "create_user",
];

#[tokio::test]
async fn test_fresh_account_is_provisioned_to_complete() {
    let harness = Harness::for_namespace(NAMESPACE);

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Complete);
    assert_eq!(harness.provider.calls(), ALL_CREATES);

    let status = harness.store.status();
    assert_eq!(status.state, Some(AccountState::Complete));
    assert_eq!(status.current_state, Some(AquaObjectState::all_created()));
    assert_eq!(status.desired_state, Some(AquaObjectState::all_created()));
    assert_eq!(status.account_name.as_deref(), Some(ACCOUNT_NAME));
    assert!(status.timestamp.is_some());

    let secret = status.account_secret.unwrap();
    assert_eq!(secret.len(), 16);
    assert_eq!(harness.provider.users()[0].password, secret);

    assert!(has_finalizer(&harness.store.account().unwrap()));
}

#[tokio::test]
async fn test_objects_carry_derived_names_and_contact() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();

    let scope = &harness.provider.scopes()[0];
    assert_eq!(scope.name, ACCOUNT_NAME);
    assert_eq!(scope.namespace_prefix, "abc123");
    assert_eq!(scope.description, "Scanner scoped to abc123-* and DockerHub only.");
    assert_eq!(scope.technical_lead_email.as_deref(), Some("lead@example.com"));

    let user = &harness.provider.users()[0];
    assert_eq!(user.name, ACCOUNT_NAME);
    assert_eq!(user.role, ACCOUNT_NAME);
}

#[tokio::test]
async fn test_first_status_write_registers_account() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();

    let first = &harness.store.status_writes()[0];
    assert_eq!(first.state, Some(AccountState::New));
    assert_eq!(first.current_state, Some(AquaObjectState::all_not_created()));
    assert_eq!(first.desired_state, Some(AquaObjectState::all_created()));
}

#[tokio::test]
async fn test_first_pass_marks_running_before_any_create() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();

    let running = &harness.store.status_writes()[1];
    assert_eq!(running.state, Some(AccountState::Running));
    assert_eq!(running.current_state, Some(AquaObjectState::all_not_created()));
    assert_eq!(running.desired_state, Some(AquaObjectState::all_created()));
}

#[tokio::test]
async fn test_status_conflict_is_retried_from_stored_progress() {
    let store = FakeStore::new(account(NAMESPACE));
    // New, Running and the scope record succeed; the permission set record loses a race
    store.conflict_after_status_writes(3);
    let harness = Harness::new(store);

    let result = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await;
    assert!(matches!(result, Err(ReconcilerError::Store(_))));
    assert_eq!(harness.provider.calls(), &ALL_CREATES[..2]);
    assert_eq!(
        harness.store.status().current_state.unwrap().get(SubResource::PermissionSet),
        ObjectState::NotCreated
    );

    harness.provider.clear_calls();
    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Complete);
    assert_eq!(harness.provider.calls(), &ALL_CREATES[1..]);
    assert_eq!(
        harness.store.status().current_state,
        Some(AquaObjectState::all_created())
    );
}

#[tokio::test]
async fn test_complete_account_is_left_alone() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    harness.provider.clear_calls();
    let writes = harness.store.status_writes().len();

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Converged);
    assert!(harness.provider.calls().is_empty());
    assert_eq!(harness.store.status_writes().len(), writes);
}

#[tokio::test]
async fn test_failed_step_resumes_without_repeating_creates() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.provider.fail("create_role", Failure::Rejected);

    let result = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await;
    assert!(matches!(
        result,
        Err(ReconcilerError::Provisioning {
            step: SubResource::Role,
            ..
        })
    ));
    assert_eq!(harness.provider.calls(), &ALL_CREATES[..3]);

    let status = harness.store.status();
    assert_eq!(status.state, Some(AccountState::Failed));
    assert!(status.message.unwrap().contains("Failed to create Role"));
    let current = status.current_state.unwrap();
    assert_eq!(current.get(SubResource::ApplicationScope), ObjectState::Created);
    assert_eq!(current.get(SubResource::PermissionSet), ObjectState::Created);
    assert_eq!(current.get(SubResource::Role), ObjectState::NotCreated);
    assert_eq!(current.get(SubResource::User), ObjectState::NotCreated);

    harness.provider.recover("create_role");
    harness.provider.clear_calls();

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Complete);
    assert_eq!(harness.provider.calls(), ["create_role", "create_user"]);
    assert_eq!(harness.store.status().state, Some(AccountState::Complete));
}

#[tokio::test]
async fn test_stored_secret_is_reused_on_retry() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.provider.fail("create_user", Failure::Rejected);

    assert!(matches!(
        harness.reconciler.reconcile_pass(NAMESPACE, NAME).await,
        Err(ReconcilerError::Provisioning { .. })
    ));
    let stored_secret = harness.store.status().account_secret.unwrap();

    harness.provider.recover("create_user");
    harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();

    let users = harness.provider.users();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].password, stored_secret);
    assert_eq!(users[1].password, stored_secret);
    assert_eq!(harness.store.status().account_secret, Some(stored_secret));
}

#[tokio::test]
async fn test_secret_is_persisted_before_user_create() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.provider.fail("create_user", Failure::Rejected);
    assert!(matches!(
        harness.reconciler.reconcile_pass(NAMESPACE, NAME).await,
        Err(ReconcilerError::Provisioning { .. })
    ));

    let status = harness.store.status();
    assert_eq!(status.account_name.as_deref(), Some(ACCOUNT_NAME));
    assert_eq!(status.account_secret, Some(harness.provider.users()[0].password.clone()));
}

#[tokio::test]
async fn test_recorded_progress_survives_first_observation() {
    let mut partial = account(NAMESPACE);
    partial.status = Some(AquaScannerAccountStatus {
        current_state: Some(
            AquaObjectState::all_not_created()
                .with(SubResource::ApplicationScope, ObjectState::Created),
        ),
        ..Default::default()
    });
    let harness = Harness::new(FakeStore::new(partial));

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Complete);
    assert_eq!(harness.provider.calls(), &ALL_CREATES[1..]);
}

#[tokio::test]
async fn test_account_outside_tools_namespace_is_rejected() {
    let harness = Harness::for_namespace("abc123-dev");

    let outcome = harness.reconciler.reconcile_pass("abc123-dev", NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Rejected);
    assert!(harness.provider.calls().is_empty());

    let status = harness.store.status();
    assert_eq!(status.state, Some(AccountState::Failed));
    let message = status.message.unwrap();
    assert!(message.contains("-tools"));
    assert!(message.contains("abc123-dev"));
    assert!(!has_finalizer(&harness.store.account().unwrap()));
}

#[tokio::test]
async fn test_repeated_failure_keeps_first_timestamp() {
    let harness = Harness::for_namespace("abc123-dev");
    harness.reconciler.reconcile_pass("abc123-dev", NAME).await.unwrap();
    let first = harness.store.status().timestamp;

    let outcome = harness.reconciler.reconcile_pass("abc123-dev", NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Rejected);
    assert_eq!(harness.store.status_writes().len(), 1);
    assert_eq!(harness.store.status().timestamp, first);
}

#[tokio::test]
async fn test_broken_login_suspends_provisioning() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.login_health.record_failure(LOGIN_URL, "login refused");

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Suspended);
    assert!(harness.provider.calls().is_empty());

    let status = harness.store.status();
    assert_eq!(status.state, Some(AccountState::Failed));
    assert!(status.message.unwrap().contains(LOGIN_URL));
}

#[tokio::test]
async fn test_refused_login_mid_pass_suspends_later_passes() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness
        .provider
        .fail("create_application_scope", Failure::LoginRefused);

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Suspended);
    assert_eq!(harness.login_health.broken_endpoint().as_deref(), Some(LOGIN_URL));

    harness.provider.clear_calls();
    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Suspended);
    assert!(harness.provider.calls().is_empty());
}

#[tokio::test]
async fn test_login_recovers_after_recheck() {
    let harness = Harness::rechecking_login(FakeStore::new(account(NAMESPACE)));
    harness.login_health.record_failure(LOGIN_URL, "login refused");
    harness.provider.fail("check_login", Failure::LoginRefused);

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Suspended);
    assert_eq!(harness.provider.calls(), ["check_login"]);
    assert_eq!(harness.store.status().state, Some(AccountState::Failed));

    harness.provider.recover("check_login");
    harness.provider.clear_calls();
    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Complete);
    assert_eq!(harness.login_health.broken_endpoint(), None);

    let mut expected = vec!["check_login"];
    expected.extend(ALL_CREATES);
    assert_eq!(harness.provider.calls(), expected);
}

#[tokio::test]
async fn test_login_is_not_rechecked_before_interval() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.login_health.record_failure(LOGIN_URL, "login refused");

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Suspended);
    assert!(!harness.provider.calls().contains(&"check_login".to_string()));
}

#[tokio::test]
async fn test_unavailable_login_check_does_not_suspend() {
    let harness = Harness::for_namespace(NAMESPACE);
    let unavailable = Err(AccessError::Rejected {
        method: "POST",
        url: LOGIN_URL.to_string(),
        status: 503,
        message: "service unavailable".to_string(),
    });
    assert!(!harness.login_health.record_check(&unavailable));

    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::Complete);
    assert_eq!(harness.provider.calls(), ALL_CREATES);
}

#[tokio::test]
async fn test_suspended_account_is_requeued_for_recheck() {
    let harness = Harness::for_namespace(NAMESPACE);
    harness.login_health.record_failure(LOGIN_URL, "login refused");

    let Harness {
        store, reconciler, ..
    } = harness;
    let action = reconcile(Arc::new(store.account().unwrap()), Arc::new(reconciler))
        .await
        .unwrap();
    assert_eq!(
        action,
        Action::requeue(Duration::from_secs(DEFAULT_LOGIN_RECHECK_SECS))
    );
}

#[tokio::test]
async fn test_missing_account_is_not_found() {
    let harness = Harness::new(FakeStore::empty());
    let outcome = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await.unwrap();
    assert_eq!(outcome, PassOutcome::NotFound);
    assert!(harness.provider.calls().is_empty());
}

#[tokio::test]
async fn test_unsatisfiable_password_policy_fails_before_user_create() {
    let settings = ReconcilerSettings {
        password_policy: PasswordPolicy {
            length: 2,
            ..PasswordPolicy::default()
        },
        ..ReconcilerSettings::default()
    };
    let harness = Harness::with_settings(FakeStore::new(account(NAMESPACE)), settings);

    let result = harness.reconciler.reconcile_pass(NAMESPACE, NAME).await;
    assert!(matches!(result, Err(ReconcilerError::Password(_))));
    assert!(!harness.provider.calls().contains(&"create_user".to_string()));

    let status = harness.store.status();
    assert_eq!(status.state, Some(AccountState::Failed));
    assert_eq!(status.account_secret, None);
}

#[tokio::test]
async fn test_reconcile_resets_backoff_after_success() {
    let harness = Harness::for_namespace(NAMESPACE);
    let key = format!("{NAMESPACE}/{NAME}");
    harness
        .reconciler
        .backoff_states
        .lock()
        .unwrap()
        .insert(key.clone(), BackoffState::new(5, 300));

    let Harness {
        store, reconciler, ..
    } = harness;
    let reconciler = Arc::new(reconciler);
    let result = reconcile(Arc::new(store.account().unwrap()), Arc::clone(&reconciler)).await;

    assert!(matches!(result, Ok(_)));
    assert!(!reconciler.backoff_states.lock().unwrap().contains_key(&key));
}
