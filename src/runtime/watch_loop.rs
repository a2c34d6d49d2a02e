//! # Watch Loop
//!
//! Runs the kube-runtime controller over `AquaScannerAccount` resources.
//!
//! The watch stream only passes on objects that are new (by uid), whose generation
//! changed, or whose deletion was just requested. Status and finalizer writes made by the
//! reconciler itself therefore do not trigger another pass; retries are scheduled by
//! the error policy instead.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::crd::AquaScannerAccount;
use crate::runtime::error_policy::handle_reconciliation_error;
use anyhow::Result;
use futures::{future, StreamExt, TryStreamExt};
use kube::api::Api;
use kube::runtime::controller::{self, Controller};
use kube::runtime::reflector;
use kube::runtime::watcher;
use kube::runtime::WatchStreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the watch filter remembers about an account
type Observation = (Option<i64>, bool);

/// Filter over watch events that only lets through changes worth reconciling
///
/// Accounts are remembered by uid, so an account deleted and recreated under the same
/// name is a new object. Deleted accounts are forgotten, and a relist replaces the
/// remembered set so deletions missed while the watch was down are dropped too.
#[derive(Debug, Default)]
pub struct ChangeGate {
    seen: HashMap<String, Observation>,
    /// Accounts seen so far during a relist
    relisted: Option<HashMap<String, Observation>>,
}

impl ChangeGate {
    fn key(account: &AquaScannerAccount) -> String {
        account.metadata.uid.clone().unwrap_or_else(|| {
            format!(
                "{}/{}",
                account.metadata.namespace.as_deref().unwrap_or_default(),
                account.metadata.name.as_deref().unwrap_or_default()
            )
        })
    }

    fn observe(&mut self, account: &AquaScannerAccount) -> bool {
        let key = Self::key(account);
        let observation = (
            account.metadata.generation,
            account.metadata.deletion_timestamp.is_some(),
        );
        let previous = match self.relisted.as_mut() {
            Some(relisted) => {
                relisted.insert(key.clone(), observation);
                self.seen.get(&key).copied()
            }
            None => self.seen.insert(key, observation),
        };
        previous != Some(observation)
    }

    /// The account to reconcile for `event`, if any
    pub fn admit(
        &mut self,
        event: watcher::Event<AquaScannerAccount>,
    ) -> Option<AquaScannerAccount> {
        match event {
            watcher::Event::Apply(account) | watcher::Event::InitApply(account) => {
                self.observe(&account).then_some(account)
            }
            watcher::Event::Delete(account) => {
                self.seen.remove(&Self::key(&account));
                None
            }
            watcher::Event::Init => {
                self.relisted = Some(HashMap::new());
                None
            }
            watcher::Event::InitDone => {
                if let Some(relisted) = self.relisted.take() {
                    self.seen = relisted;
                }
                None
            }
        }
    }

    /// Number of accounts currently remembered
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Run the controller until a shutdown signal is received
///
/// # Errors
///
/// Currently never fails; the controller retries watch errors with backoff.
pub async fn run_watch_loop(
    accounts: Api<AquaScannerAccount>,
    reconciler: Arc<Reconciler>,
) -> Result<()> {
    let (reader, writer) = reflector::store();
    let mut gate = ChangeGate::default();

    let changes = watcher(accounts, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .try_filter_map(move |event| future::ready(Ok(gate.admit(event))));

    info!("Watching AquaScannerAccount resources in all namespaces");

    Controller::for_stream(changes, reader)
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((account, _)) => {
                    debug!("Reconciled {}/{}", account.namespace.as_deref().unwrap_or_default(), account.name);
                }
                // Already logged by the error policy
                Err(controller::Error::ReconcilerFailed(_, account)) => {
                    debug!("Reconcile of {} failed and was requeued", account.name);
                }
                Err(e) => warn!("Controller stream error: {}", e),
            }
        })
        .await;

    info!("Controller stopped");
    Ok(())
}
