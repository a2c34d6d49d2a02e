//! In-memory control plane and access provider shared by the reconciler tests

use aqua_scanner_account_controller::controller::reconciler::{
    AccountStore, Reconciler, ReconcilerSettings,
};
use aqua_scanner_account_controller::crd::{
    AquaScannerAccount, AquaScannerAccountSpec, AquaScannerAccountStatus,
};
use aqua_scanner_account_controller::provider::aqua::LoginHealth;
use aqua_scanner_account_controller::provider::{
    AccessError, AccessProvider, ApplicationScopeSpec, PermissionSetSpec, RoleSpec, UserSpec,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "abc123-tools";
pub const NAME: &str = "scanner";
pub const ACCOUNT_NAME: &str = "ScannerCLI_abc123-tools";
pub const LOGIN_URL: &str = "https://aqua.test/api/v1/login";

pub const CONTACTS: &str = r"
- role: Product Owner
  email: owner@example.com
- role: Technical Lead
  email: lead@example.com
";

pub fn account(namespace: &str) -> AquaScannerAccount {
    let mut account = AquaScannerAccount::new(NAME, AquaScannerAccountSpec {});
    account.metadata.namespace = Some(namespace.to_string());
    account.metadata.resource_version = Some("1".to_string());
    account.metadata.generation = Some(1);
    account
}

/// Control plane holding a single account
///
/// Like the API server, an account whose deletion was requested disappears once its
/// last finalizer is removed.
#[derive(Default)]
pub struct FakeStore {
    account: Mutex<Option<AquaScannerAccount>>,
    annotations: BTreeMap<String, String>,
    status_writes: Mutex<Vec<AquaScannerAccountStatus>>,
    /// Number of accepted status writes after which the next one loses a race
    conflict_after: Mutex<Option<usize>>,
}

impl FakeStore {
    pub fn new(account: AquaScannerAccount) -> Self {
        Self {
            account: Mutex::new(Some(account)),
            annotations: BTreeMap::from([("contacts".to_string(), CONTACTS.to_string())]),
            status_writes: Mutex::new(Vec::new()),
            conflict_after: Mutex::new(None),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn account(&self) -> Option<AquaScannerAccount> {
        self.account.lock().unwrap().clone()
    }

    pub fn status(&self) -> AquaScannerAccountStatus {
        self.account()
            .and_then(|account| account.status)
            .unwrap_or_default()
    }

    pub fn status_writes(&self) -> Vec<AquaScannerAccountStatus> {
        self.status_writes.lock().unwrap().clone()
    }

    pub fn request_deletion(&self) {
        let mut guard = self.account.lock().unwrap();
        if let Some(account) = guard.as_mut() {
            account.metadata.deletion_timestamp =
                serde_json::from_value(serde_json::json!("2024-05-01T10:00:00Z")).unwrap();
        }
    }

    /// Make the status write following `accepted` successful writes fail as if another
    /// writer changed the account first
    pub fn conflict_after_status_writes(&self, accepted: usize) {
        *self.conflict_after.lock().unwrap() = Some(accepted);
    }

    fn bump(account: &mut AquaScannerAccount) {
        let next = account
            .metadata
            .resource_version
            .as_deref()
            .and_then(|rv| rv.parse::<u64>().ok())
            .unwrap_or_default()
            + 1;
        account.metadata.resource_version = Some(next.to_string());
    }
}

#[async_trait]
impl AccountStore for FakeStore {
    async fn get(&self, namespace: &str, name: &str) -> anyhow::Result<Option<AquaScannerAccount>> {
        Ok(self.account().filter(|account| {
            account.metadata.namespace.as_deref() == Some(namespace)
                && account.metadata.name.as_deref() == Some(name)
        }))
    }

    async fn update(&self, account: &AquaScannerAccount) -> anyhow::Result<AquaScannerAccount> {
        let mut guard = self.account.lock().unwrap();
        let stored = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("account not found"))?;
        if stored.metadata.resource_version != account.metadata.resource_version {
            anyhow::bail!("account was modified concurrently");
        }

        stored.metadata.finalizers = account.metadata.finalizers.clone();
        Self::bump(stored);
        let updated = stored.clone();

        let released = updated
            .metadata
            .finalizers
            .as_ref()
            .is_none_or(Vec::is_empty);
        if updated.metadata.deletion_timestamp.is_some() && released {
            *guard = None;
        }
        Ok(updated)
    }

    async fn update_status(
        &self,
        account: &AquaScannerAccount,
        status: &AquaScannerAccountStatus,
    ) -> anyhow::Result<AquaScannerAccount> {
        let mut guard = self.account.lock().unwrap();
        let stored = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("account not found"))?;
        if stored.metadata.resource_version != account.metadata.resource_version {
            anyhow::bail!("status was modified concurrently");
        }
        let mut conflict_after = self.conflict_after.lock().unwrap();
        if *conflict_after == Some(self.status_writes.lock().unwrap().len()) {
            *conflict_after = None;
            Self::bump(stored);
            anyhow::bail!("status was modified concurrently");
        }

        stored.status = Some(status.clone());
        Self::bump(stored);
        self.status_writes.lock().unwrap().push(status.clone());
        Ok(stored.clone())
    }

    async fn namespace_annotations(
        &self,
        _namespace: &str,
    ) -> anyhow::Result<BTreeMap<String, String>> {
        Ok(self.annotations.clone())
    }
}

/// How a scripted provider call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Aqua answered with a server error
    Rejected,
    /// The controller's login was refused
    LoginRefused,
}

impl Failure {
    fn error(self, operation: &str) -> AccessError {
        match self {
            Failure::Rejected => AccessError::Rejected {
                method: "POST",
                url: format!("https://aqua.test/{operation}"),
                status: 500,
                message: "internal error".to_string(),
            },
            Failure::LoginRefused => AccessError::Authentication {
                url: LOGIN_URL.to_string(),
                status: 401,
            },
        }
    }
}

/// Access provider recording every call, with per-operation scripted failures
#[derive(Default)]
pub struct FakeProvider {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, Failure>>,
    scopes: Mutex<Vec<ApplicationScopeSpec>>,
    users: Mutex<Vec<UserSpec>>,
}

impl FakeProvider {
    pub fn fail(&self, operation: &str, failure: Failure) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), failure);
    }

    pub fn recover(&self, operation: &str) {
        self.failures.lock().unwrap().remove(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn scopes(&self) -> Vec<ApplicationScopeSpec> {
        self.scopes.lock().unwrap().clone()
    }

    pub fn users(&self) -> Vec<UserSpec> {
        self.users.lock().unwrap().clone()
    }

    fn call(&self, operation: &str) -> Result<(), AccessError> {
        self.calls.lock().unwrap().push(operation.to_string());
        match self.failures.lock().unwrap().get(operation) {
            Some(failure) => Err(failure.error(operation)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AccessProvider for FakeProvider {
    async fn check_login(&self) -> Result<(), AccessError> {
        self.call("check_login")
    }

    async fn create_application_scope(
        &self,
        scope: &ApplicationScopeSpec,
    ) -> Result<(), AccessError> {
        self.scopes.lock().unwrap().push(scope.clone());
        self.call("create_application_scope")
    }

    async fn delete_application_scope(&self, _name: &str) -> Result<(), AccessError> {
        self.call("delete_application_scope")
    }

    async fn create_permission_set(
        &self,
        _permission_set: &PermissionSetSpec,
    ) -> Result<(), AccessError> {
        self.call("create_permission_set")
    }

    async fn delete_permission_set(&self, _name: &str) -> Result<(), AccessError> {
        self.call("delete_permission_set")
    }

    async fn create_role(&self, _role: &RoleSpec) -> Result<(), AccessError> {
        self.call("create_role")
    }

    async fn delete_role(&self, _name: &str) -> Result<(), AccessError> {
        self.call("delete_role")
    }

    async fn create_user(&self, user: &UserSpec) -> Result<(), AccessError> {
        self.users.lock().unwrap().push(user.clone());
        self.call("create_user")
    }

    async fn delete_user(&self, _name: &str) -> Result<(), AccessError> {
        self.call("delete_user")
    }
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub provider: Arc<FakeProvider>,
    pub login_health: Arc<LoginHealth>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(store: FakeStore) -> Self {
        Self::with_settings(store, ReconcilerSettings::default())
    }

    pub fn with_settings(store: FakeStore, settings: ReconcilerSettings) -> Self {
        Self::assemble(store, settings, LoginHealth::default())
    }

    /// Harness whose recorded login failures are rechecked on every pass
    pub fn rechecking_login(store: FakeStore) -> Self {
        Self::assemble(
            store,
            ReconcilerSettings::default(),
            LoginHealth::new(Duration::ZERO),
        )
    }

    fn assemble(store: FakeStore, settings: ReconcilerSettings, login_health: LoginHealth) -> Self {
        let store = Arc::new(store);
        let provider = Arc::new(FakeProvider::default());
        let login_health = Arc::new(login_health);
        let reconciler = Reconciler::new(
            Arc::clone(&store) as Arc<dyn AccountStore>,
            Arc::clone(&provider) as Arc<dyn AccessProvider>,
            Arc::clone(&login_health),
            settings,
        );
        Self {
            store,
            provider,
            login_health,
            reconciler,
        }
    }

    pub fn for_namespace(namespace: &str) -> Self {
        Self::new(FakeStore::new(account(namespace)))
    }
}
