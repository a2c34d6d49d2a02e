//! # Reconciler Configuration
//!
//! Aqua endpoint, credentials, naming and password policy.

use super::env_var_or_default;
use crate::constants::{
    DEFAULT_ACCOUNT_NAME_PREFIX, DEFAULT_AQUA_HTTP_TIMEOUT_SECS, DEFAULT_BACKOFF_MAX_SECS,
    DEFAULT_BACKOFF_MIN_SECS, DEFAULT_LOGIN_RECHECK_SECS, DEFAULT_PASSWORD_LENGTH,
    DEFAULT_REQUIRED_NAMESPACE_SUFFIX,
};
use crate::controller::password::PasswordPolicy;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Controller configuration
#[derive(Clone)]
pub struct ControllerConfig {
    /// Aqua console base URL (`AQUA_URL`)
    pub aqua_url: String,
    /// Aqua login identity (`AQUA_USER`)
    pub aqua_user: String,
    /// Aqua login secret (`AQUA_PASSWORD`)
    pub aqua_password: Zeroizing<String>,
    /// Prefix of the derived account name
    pub account_name_prefix: String,
    /// Suffix a namespace must carry to host an account
    pub required_namespace_suffix: String,
    /// Policy for generated user passwords
    pub password_policy: PasswordPolicy,
    /// Timeout for a single Aqua request (seconds)
    pub http_timeout_secs: u64,
    /// Error backoff bounds (seconds)
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    /// How long a refused Aqua login suspends provisioning before it is checked again (seconds)
    pub login_recheck_secs: u64,
}

impl std::fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("aqua_url", &self.aqua_url)
            .field("aqua_user", &self.aqua_user)
            .field("account_name_prefix", &self.account_name_prefix)
            .field("required_namespace_suffix", &self.required_namespace_suffix)
            .field("password_policy", &self.password_policy)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("login_recheck_secs", &self.login_recheck_secs)
            .finish_non_exhaustive()
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `AQUA_URL`, `AQUA_USER` or `AQUA_PASSWORD` is unset, or the
    /// password policy cannot be satisfied.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// See [`ControllerConfig::from_env`].
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };

        let aqua_url = required("AQUA_URL")?.trim_end_matches('/').to_string();
        let aqua_user = required("AQUA_USER")?;
        let aqua_password = Zeroizing::new(required("AQUA_PASSWORD")?);

        let password_policy = PasswordPolicy {
            length: env_var_or_default(lookup, "PASSWORD_LENGTH", DEFAULT_PASSWORD_LENGTH),
            include_uppercase: env_var_or_default(lookup, "PASSWORD_INCLUDE_UPPERCASE", true),
            include_numbers: env_var_or_default(lookup, "PASSWORD_INCLUDE_NUMBERS", true),
            include_symbols: env_var_or_default(lookup, "PASSWORD_INCLUDE_SYMBOLS", true),
        };
        password_policy
            .validate()
            .context("Invalid password policy configuration")?;

        Ok(Self {
            aqua_url,
            aqua_user,
            aqua_password,
            account_name_prefix: lookup("ACCOUNT_NAME_PREFIX")
                .unwrap_or_else(|| DEFAULT_ACCOUNT_NAME_PREFIX.to_string()),
            required_namespace_suffix: lookup("REQUIRED_NAMESPACE_SUFFIX")
                .unwrap_or_else(|| DEFAULT_REQUIRED_NAMESPACE_SUFFIX.to_string()),
            password_policy,
            http_timeout_secs: env_var_or_default(
                lookup,
                "AQUA_HTTP_TIMEOUT_SECS",
                DEFAULT_AQUA_HTTP_TIMEOUT_SECS,
            ),
            backoff_min_secs: env_var_or_default(
                lookup,
                "BACKOFF_MIN_SECS",
                DEFAULT_BACKOFF_MIN_SECS,
            ),
            backoff_max_secs: env_var_or_default(
                lookup,
                "BACKOFF_MAX_SECS",
                DEFAULT_BACKOFF_MAX_SECS,
            ),
            login_recheck_secs: env_var_or_default(
                lookup,
                "LOGIN_RECHECK_SECS",
                DEFAULT_LOGIN_RECHECK_SECS,
            ),
        })
    }
}
