//! # Reconciler Types
//!
//! Core types for the reconciler: the shared context, its settings, error type, pass
//! outcomes and per-resource backoff state.

use crate::config::ControllerConfig;
use crate::constants::{
    DEFAULT_ACCOUNT_NAME_PREFIX, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS,
    DEFAULT_REQUIRED_NAMESPACE_SUFFIX,
};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::password::{PasswordPolicy, PasswordPolicyError};
use crate::controller::reconciler::store::AccountStore;
use crate::crd::SubResource;
use crate::provider::aqua::LoginHealth;
use crate::provider::{AccessError, AccessProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Error returned by a reconciliation pass
///
/// Every variant is retryable: the error policy requeues the account with backoff.
/// Conditions an operator has to fix (wrong namespace, refused login) are reported
/// through the status and end the pass with `Ok`.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Reading or writing the account failed, including conflicting concurrent writes
    #[error("control plane request failed: {0:#}")]
    Store(#[from] anyhow::Error),
    /// Creating one of the Aqua objects failed
    #[error("failed to provision {step}: {source}")]
    Provisioning {
        step: SubResource,
        #[source]
        source: AccessError,
    },
    /// Removing the Aqua objects of a deleted account failed
    #[error("failed to remove Aqua objects: {0}")]
    Finalization(#[source] AccessError),
    /// No password could be generated for the scanner user
    #[error("unable to generate account password: {0}")]
    Password(#[from] PasswordPolicyError),
}

/// How a reconciliation pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The account no longer exists
    NotFound,
    /// The account lives in a namespace that may not host one
    Rejected,
    /// Aqua login is known to be broken; requeued until the next login check
    Suspended,
    /// Aqua objects were removed and the finalizer released
    Finalized,
    /// The account was already complete
    Converged,
    /// Every Aqua object was provisioned in this pass
    Complete,
    /// The provisioned objects still differ from the desired ones
    Incomplete,
}

/// Naming, password and retry settings for the reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub account_name_prefix: String,
    pub required_namespace_suffix: String,
    pub password_policy: PasswordPolicy,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            account_name_prefix: DEFAULT_ACCOUNT_NAME_PREFIX.to_string(),
            required_namespace_suffix: DEFAULT_REQUIRED_NAMESPACE_SUFFIX.to_string(),
            password_policy: PasswordPolicy::default(),
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

impl From<&ControllerConfig> for ReconcilerSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            account_name_prefix: config.account_name_prefix.clone(),
            required_namespace_suffix: config.required_namespace_suffix.clone(),
            password_policy: config.password_policy,
            backoff_min_secs: config.backoff_min_secs,
            backoff_max_secs: config.backoff_max_secs,
        }
    }
}

impl ReconcilerSettings {
    /// Aqua name shared by every object of the account in `namespace`
    pub fn account_name(&self, namespace: &str) -> String {
        format!("{}{}", self.account_name_prefix, namespace)
    }

    /// `namespace` without the required suffix, or `None` if it may not host an account
    pub fn namespace_prefix<'a>(&self, namespace: &'a str) -> Option<&'a str> {
        namespace.strip_suffix(self.required_namespace_suffix.as_str())
    }
}

/// Backoff state for a single account
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

/// Reconciler context shared by every reconciliation
pub struct Reconciler {
    pub store: Arc<dyn AccountStore>,
    pub provider: Arc<dyn AccessProvider>,
    pub login_health: Arc<LoginHealth>,
    pub settings: ReconcilerSettings,
    /// Per-account backoff, keyed by `namespace/name`
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .field("login_health", &self.login_health)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn AccountStore>,
        provider: Arc<dyn AccessProvider>,
        login_health: Arc<LoginHealth>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            provider,
            login_health,
            settings,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Forget the error backoff of an account after a successful pass
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}
