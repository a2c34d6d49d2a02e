//! # Account Store
//!
//! Control-plane access used by the reconciler: reading accounts, writing their
//! finalizers and status, and looking up namespace annotations.
//!
//! Writes are JSON merge patches carrying the `resourceVersion` the reconciler last saw,
//! so a concurrent writer makes the patch fail with a conflict instead of being silently
//! overwritten. The failed pass is retried against a freshly loaded object.

use crate::constants::{FIELD_MANAGER, FINALIZER};
use crate::crd::{AquaScannerAccount, AquaScannerAccountStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::debug;

/// Trait abstracting the control plane for `AquaScannerAccount` resources
///
/// This trait allows the reconciler to run against an in-memory store in tests while
/// using the Kubernetes API in production.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Load an account, `None` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<AquaScannerAccount>>;

    /// Persist the account's finalizers, returning the stored object
    async fn update(&self, account: &AquaScannerAccount) -> Result<AquaScannerAccount>;

    /// Persist a complete status, returning the stored object
    async fn update_status(
        &self,
        account: &AquaScannerAccount,
        status: &AquaScannerAccountStatus,
    ) -> Result<AquaScannerAccount>;

    /// Annotations of a namespace; empty if the namespace has none
    async fn namespace_annotations(&self, namespace: &str) -> Result<BTreeMap<String, String>>;
}

/// True if the account carries the controller's finalizer
pub fn has_finalizer(account: &AquaScannerAccount) -> bool {
    account
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == FINALIZER))
}

/// Copy of the account with the controller's finalizer added
pub fn with_finalizer(account: &AquaScannerAccount) -> AquaScannerAccount {
    let mut updated = account.clone();
    if !has_finalizer(account) {
        updated
            .metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(FINALIZER.to_string());
    }
    updated
}

/// Copy of the account with the controller's finalizer removed
pub fn without_finalizer(account: &AquaScannerAccount) -> AquaScannerAccount {
    let mut updated = account.clone();
    if let Some(finalizers) = updated.metadata.finalizers.as_mut() {
        finalizers.retain(|f| f != FINALIZER);
    }
    updated
}

fn identity(account: &AquaScannerAccount) -> Result<(&str, &str)> {
    let name = account
        .metadata
        .name
        .as_deref()
        .context("AquaScannerAccount has no name")?;
    let namespace = account
        .metadata
        .namespace
        .as_deref()
        .context("AquaScannerAccount has no namespace")?;
    Ok((namespace, name))
}

fn is_status(error: &kube::Error, code: u16) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == code)
}

/// Kubernetes-backed [`AccountStore`]
#[derive(Clone)]
pub struct KubeAccountStore {
    client: Client,
}

impl std::fmt::Debug for KubeAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeAccountStore").finish_non_exhaustive()
    }
}

impl KubeAccountStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn accounts(&self, namespace: &str) -> Api<AquaScannerAccount> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl AccountStore for KubeAccountStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<AquaScannerAccount>> {
        self.accounts(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get AquaScannerAccount {namespace}/{name}"))
    }

    async fn update(&self, account: &AquaScannerAccount) -> Result<AquaScannerAccount> {
        let (namespace, name) = identity(account)?;
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": account.metadata.resource_version,
                "finalizers": account.metadata.finalizers.clone().unwrap_or_default(),
            }
        });

        self.accounts(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| {
                let conflict = is_status(&e, 409);
                anyhow::Error::new(e).context(if conflict {
                    format!("AquaScannerAccount {namespace}/{name} was modified concurrently")
                } else {
                    format!("Failed to update finalizers of AquaScannerAccount {namespace}/{name}")
                })
            })
    }

    async fn update_status(
        &self,
        account: &AquaScannerAccount,
        status: &AquaScannerAccountStatus,
    ) -> Result<AquaScannerAccount> {
        let (namespace, name) = identity(account)?;
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": account.metadata.resource_version,
            },
            "status": status,
        });

        match self
            .accounts(namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
        {
            Ok(updated) => Ok(updated),
            Err(e) if is_status(&e, 404) => {
                // Deleted during reconciliation; the next lookup reports it as gone
                debug!(
                    "AquaScannerAccount {}/{} was deleted during reconciliation, skipping status update",
                    namespace, name
                );
                let mut unchanged = account.clone();
                unchanged.status = Some(status.clone());
                Ok(unchanged)
            }
            Err(e) => {
                let conflict = is_status(&e, 409);
                Err(anyhow::Error::new(e).context(if conflict {
                    format!("Status of AquaScannerAccount {namespace}/{name} was modified concurrently")
                } else {
                    format!("Failed to update status of AquaScannerAccount {namespace}/{name}")
                }))
            }
        }
    }

    async fn namespace_annotations(&self, namespace: &str) -> Result<BTreeMap<String, String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let found = namespaces
            .get_opt(namespace)
            .await
            .with_context(|| format!("Failed to get namespace {namespace}"))?;
        Ok(found
            .and_then(|ns| ns.metadata.annotations)
            .unwrap_or_default())
    }
}
