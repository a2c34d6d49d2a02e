//! # Reconciliation
//!
//! The provisioning state machine for `AquaScannerAccount` resources.
//!
//! A pass always starts from the stored status rather than from the triggering event:
//!
//! 1. A missing account is treated as already deleted.
//! 2. Accounts outside a permitted namespace are marked `Failed` and left alone.
//! 3. While Aqua login is known to be broken, accounts are marked `Failed` without
//!    contacting Aqua. Once the recheck interval has passed the login is tried again.
//! 4. The desired state is fixed on first observation.
//! 5. A deleted account has all four Aqua objects removed before its finalizer is released.
//! 6. The finalizer is attached before any Aqua object is created.
//! 7. A `Complete` account needs nothing.
//! 8. Otherwise every object not yet `Created` is created in dependency order, recording
//!    each success, and stopping at the first failure.
//! 9. Once every object exists the account becomes `Complete`.
//!
//! Because progress is recorded per object, an interrupted or failed pass resumes where
//! it stopped and never repeats a create that already succeeded.

use crate::controller::contacts::technical_contact;
use crate::controller::reconciler::status::update_status;
use crate::controller::reconciler::store::{has_finalizer, with_finalizer, without_finalizer};
use crate::controller::reconciler::types::{PassOutcome, Reconciler, ReconcilerError};
use crate::crd::{
    AccountState, AquaObjectState, AquaScannerAccount, AquaScannerAccountStatus, ObjectState,
    SubResource,
};
use crate::observability::metrics;
use crate::provider::{AccessError, ApplicationScopeSpec, PermissionSetSpec, RoleSpec, UserSpec};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Status update carrying only a state and a message
fn transition(state: AccountState, message: String) -> AquaScannerAccountStatus {
    AquaScannerAccountStatus {
        state: Some(state),
        message: Some(message),
        ..Default::default()
    }
}

fn current_state(account: &AquaScannerAccount) -> AquaObjectState {
    account
        .status
        .as_ref()
        .and_then(|status| status.current_state)
        .unwrap_or_default()
}

/// Names and descriptions of the Aqua objects of one account
struct AccountObjects<'a> {
    name: &'a str,
    namespace_prefix: &'a str,
    technical_lead_email: Option<String>,
}

impl AccountObjects<'_> {
    fn application_scope(&self) -> ApplicationScopeSpec {
        ApplicationScopeSpec {
            name: self.name.to_string(),
            description: format!(
                "Scanner scoped to {}-* and DockerHub only.",
                self.namespace_prefix
            ),
            namespace_prefix: self.namespace_prefix.to_string(),
            technical_lead_email: self.technical_lead_email.clone(),
        }
    }

    fn permission_set(&self) -> PermissionSetSpec {
        PermissionSetSpec {
            name: self.name.to_string(),
            description: format!(
                "AquaScannerAccount created permission set to allow scanning of images in {}-*.",
                self.namespace_prefix
            ),
            technical_lead_email: self.technical_lead_email.clone(),
        }
    }

    fn role(&self) -> RoleSpec {
        RoleSpec {
            name: self.name.to_string(),
            description: format!(
                "AquaScannerAccount created Role to allow Scanning of resources scoped to {}-* and DockerHub only.",
                self.namespace_prefix
            ),
            application_scope: self.name.to_string(),
            permission_set: self.name.to_string(),
        }
    }

    fn user(&self, password: String) -> UserSpec {
        UserSpec {
            name: self.name.to_string(),
            role: self.name.to_string(),
            password,
            email: self.technical_lead_email.clone(),
        }
    }
}

impl Reconciler {
    /// Run one reconciliation pass for the account `namespace/name`
    ///
    /// Returns `Ok` when the account reached a resting state (including the terminal
    /// `Failed` cases that need an operator), and `Err` when the pass should be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if a status or metadata write fails, an Aqua object cannot be
    /// created or deleted, or no password can be generated.
    pub async fn reconcile_pass(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PassOutcome, ReconcilerError> {
        let store = self.store.as_ref();

        let Some(mut account) = store.get(namespace, name).await? else {
            debug!(
                "AquaScannerAccount {}/{} not found, assuming it was deleted",
                namespace, name
            );
            return Ok(PassOutcome::NotFound);
        };
        let account_name = self.settings.account_name(namespace);

        let Some(namespace_prefix) = self.settings.namespace_prefix(namespace) else {
            warn!(
                "AquaScannerAccount {} was created in {}, which does not end in {}",
                name, namespace, self.settings.required_namespace_suffix
            );
            update_status(
                store,
                &account,
                &transition(
                    AccountState::Failed,
                    format!(
                        "AquaScannerAccount can only be created in namespaces ending in {}. It was created in {}",
                        self.settings.required_namespace_suffix, namespace
                    ),
                ),
            )
            .await?;
            return Ok(PassOutcome::Rejected);
        };

        if self.login_health.recheck_due() {
            let result = self.provider.check_login().await;
            if self.login_health.record_check(&result) {
                info!("Aqua login works again, resuming provisioning");
            }
        }
        if let Some(endpoint) = self.login_health.broken_endpoint() {
            warn!(
                endpoint = %endpoint,
                "Aqua login is failing, not reconciling {}/{}", namespace, name
            );
            update_status(
                store,
                &account,
                &transition(
                    AccountState::Failed,
                    format!(
                        "Unable to log in to Aqua at {endpoint}. Provisioning is suspended until the controller can log in."
                    ),
                ),
            )
            .await?;
            return Ok(PassOutcome::Suspended);
        }

        if account
            .status
            .as_ref()
            .and_then(|status| status.desired_state)
            .is_none()
        {
            let has_current = account
                .status
                .as_ref()
                .is_some_and(|status| status.current_state.is_some());
            account = update_status(
                store,
                &account,
                &AquaScannerAccountStatus {
                    state: Some(AccountState::New),
                    message: Some(format!("Registered Aqua scanner account {account_name}")),
                    current_state: (!has_current).then(AquaObjectState::all_not_created),
                    desired_state: Some(AquaObjectState::all_created()),
                    ..Default::default()
                },
            )
            .await?;
        }

        if account.metadata.deletion_timestamp.is_some() {
            return self.finalize(&account, &account_name).await;
        }

        if !has_finalizer(&account) {
            debug!("Adding finalizer to AquaScannerAccount {}/{}", namespace, name);
            account = store.update(&with_finalizer(&account)).await?;
        }

        if account.status.as_ref().and_then(|status| status.state) == Some(AccountState::Complete)
        {
            debug!("AquaScannerAccount {}/{} is already complete", namespace, name);
            return Ok(PassOutcome::Converged);
        }

        let objects = AccountObjects {
            name: &account_name,
            namespace_prefix,
            technical_lead_email: None,
        };
        self.provision(account, objects, namespace).await
    }

    async fn provision(
        &self,
        account: AquaScannerAccount,
        mut objects: AccountObjects<'_>,
        namespace: &str,
    ) -> Result<PassOutcome, ReconcilerError> {
        let store = self.store.as_ref();
        let mut account = update_status(
            store,
            &account,
            &transition(
                AccountState::Running,
                format!("Provisioning Aqua objects for {}", objects.name),
            ),
        )
        .await?;

        objects.technical_lead_email = technical_contact(&store.namespace_annotations(namespace).await?);
        if objects.technical_lead_email.is_none() {
            debug!("Namespace {} has no technical lead contact", namespace);
        }

        for kind in SubResource::PROVISIONING_ORDER {
            if current_state(&account).get(kind) == ObjectState::Created {
                debug!(object = %kind, "Already created in Aqua, skipping");
                continue;
            }

            let result = match kind {
                SubResource::ApplicationScope => {
                    self.provider
                        .create_application_scope(&objects.application_scope())
                        .await
                }
                SubResource::PermissionSet => {
                    self.provider
                        .create_permission_set(&objects.permission_set())
                        .await
                }
                SubResource::Role => self.provider.create_role(&objects.role()).await,
                SubResource::User => {
                    let (updated, password) = self.user_credentials(account, objects.name).await?;
                    account = updated;
                    self.provider.create_user(&objects.user(password)).await
                }
            };

            match result {
                Ok(()) => {
                    metrics::record_provisioning_step(kind.metric_label(), "success");
                    info!(object = %kind, account = objects.name, "Aqua object created");
                    account = update_status(
                        store,
                        &account,
                        &AquaScannerAccountStatus {
                            message: Some(format!("{kind} {} created in Aqua", objects.name)),
                            current_state: Some(
                                current_state(&account).with(kind, ObjectState::Created),
                            ),
                            ..Default::default()
                        },
                    )
                    .await?;
                }
                Err(e) => {
                    metrics::record_provisioning_step(kind.metric_label(), "failure");
                    error!(object = %kind, account = objects.name, error = %e, transport = e.is_transport(), "Failed to create Aqua object");
                    update_status(
                        store,
                        &account,
                        &AquaScannerAccountStatus {
                            state: Some(AccountState::Failed),
                            message: Some(format!(
                                "Failed to create {kind} {} in Aqua: {e}",
                                objects.name
                            )),
                            current_state: Some(
                                current_state(&account).with(kind, ObjectState::NotCreated),
                            ),
                            ..Default::default()
                        },
                    )
                    .await?;

                    if self.note_authentication_failure(&e) {
                        return Ok(PassOutcome::Suspended);
                    }
                    return Err(ReconcilerError::Provisioning {
                        step: kind,
                        source: e,
                    });
                }
            }
        }

        // A mismatch is demoted back to Running by the completion law
        let account = update_status(
            store,
            &account,
            &transition(
                AccountState::Complete,
                format!("Aqua scanner account {} is ready", objects.name),
            ),
        )
        .await?;

        if account
            .status
            .as_ref()
            .is_some_and(AquaScannerAccountStatus::is_converged)
        {
            metrics::increment_accounts_completed();
            info!(account = objects.name, "Aqua scanner account provisioned");
            Ok(PassOutcome::Complete)
        } else {
            warn!(account = objects.name, "Provisioned Aqua objects differ from the desired state");
            Ok(PassOutcome::Incomplete)
        }
    }

    /// The user password, generated and persisted on first use
    ///
    /// A stored secret is reused so a retried create sends the same credential Aqua may
    /// already have accepted. A new secret is written to the status before the create
    /// call is issued.
    async fn user_credentials(
        &self,
        account: AquaScannerAccount,
        account_name: &str,
    ) -> Result<(AquaScannerAccount, String), ReconcilerError> {
        if let Some(secret) = account
            .status
            .as_ref()
            .and_then(|status| status.account_secret.clone())
            .filter(|secret| !secret.is_empty())
        {
            debug!(account = account_name, "Reusing stored account secret");
            return Ok((account, secret));
        }

        let secret = match self.settings.password_policy.generate() {
            Ok(secret) => secret,
            Err(e) => {
                update_status(
                    self.store.as_ref(),
                    &account,
                    &transition(
                        AccountState::Failed,
                        format!("Unable to generate a password for {account_name}: {e}"),
                    ),
                )
                .await?;
                return Err(e.into());
            }
        };

        let account = update_status(
            self.store.as_ref(),
            &account,
            &AquaScannerAccountStatus {
                message: Some(format!("Generated credentials for {account_name}")),
                account_name: Some(account_name.to_string()),
                account_secret: Some(secret.clone()),
                ..Default::default()
            },
        )
        .await?;
        Ok((account, secret))
    }

    /// Remove every Aqua object of a deleted account, then release its finalizer
    ///
    /// All four deletes are attempted regardless of the recorded current state. The
    /// finalizer is only released when every delete succeeded; deletes of objects that
    /// are already gone count as success.
    ///
    /// # Errors
    ///
    /// Returns the first failed delete, or a store error.
    pub async fn finalize(
        &self,
        account: &AquaScannerAccount,
        account_name: &str,
    ) -> Result<PassOutcome, ReconcilerError> {
        info!(account = account_name, "Removing Aqua objects of deleted AquaScannerAccount");

        let mut first_failure: Option<(SubResource, AccessError)> = None;
        for kind in SubResource::TEARDOWN_ORDER {
            let result = match kind {
                SubResource::User => self.provider.delete_user(account_name).await,
                SubResource::Role => self.provider.delete_role(account_name).await,
                SubResource::ApplicationScope => {
                    self.provider.delete_application_scope(account_name).await
                }
                SubResource::PermissionSet => {
                    self.provider.delete_permission_set(account_name).await
                }
            };
            if let Err(e) = result {
                error!(object = %kind, account = account_name, error = %e, "Failed to delete Aqua object");
                if first_failure.is_none() {
                    first_failure = Some((kind, e));
                }
            }
        }

        if let Some((kind, e)) = first_failure {
            metrics::increment_finalizations("failure");
            self.note_authentication_failure(&e);
            update_status(
                self.store.as_ref(),
                account,
                &transition(
                    AccountState::Failed,
                    format!("Failed to delete {kind} {account_name} from Aqua: {e}"),
                ),
            )
            .await?;
            return Err(ReconcilerError::Finalization(e));
        }

        if has_finalizer(account) {
            self.store.update(&without_finalizer(account)).await?;
        }
        metrics::increment_finalizations("success");
        info!(account = account_name, "Aqua objects removed, finalizer released");
        Ok(PassOutcome::Finalized)
    }

    /// Record a refused login so later passes stop contacting Aqua
    fn note_authentication_failure(&self, error: &AccessError) -> bool {
        if error.is_authentication() {
            self.login_health
                .record_failure(error.url(), &error.to_string());
            return true;
        }
        false
    }
}

/// Reconcile an `AquaScannerAccount` for the controller runtime
///
/// # Errors
///
/// Returns the pass error so the error policy can requeue with backoff.
pub async fn reconcile(
    account: Arc<AquaScannerAccount>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = account.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = account.metadata.namespace.as_deref().unwrap_or("default");

    let span = info_span!(
        "reconcile",
        resource.name = name,
        resource.namespace = namespace
    );

    async move {
        metrics::increment_reconciliations();
        let start = Instant::now();
        let result = ctx.reconcile_pass(namespace, name).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.reset_backoff(&format!("{namespace}/{name}"));
        debug!(outcome = ?outcome, "Reconciliation pass finished");
        if outcome == PassOutcome::Suspended {
            metrics::increment_requeues_total("login-suspended");
            return Ok(Action::requeue(ctx.login_health.recheck_after()));
        }
        Ok(Action::await_change())
    }
    .instrument(span)
    .await
}
