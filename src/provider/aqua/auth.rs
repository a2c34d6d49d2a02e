//! # Aqua Authentication
//!
//! Handles authentication for the Aqua API, including token management.
//!
//! [`CredentialCache`] owns the single bearer token shared by every reconciliation.
//! [`LoginHealth`] records whether logging in works at all, so the reconciler can stop
//! contacting Aqua while the configured credentials are known to be bad.

use crate::constants::DEFAULT_LOGIN_RECHECK_SECS;
use crate::observability::metrics;
use crate::provider::AccessError;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::sync::PoisonError;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// Source of bearer tokens for the Aqua API
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A valid bearer token, logging in if needed
    async fn get_token(&self) -> Result<String, AccessError>;

    /// Drop the cached token so the next call logs in again
    async fn invalidate(&self);

    /// Login endpoint, used in diagnostics
    fn endpoint(&self) -> &str;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    id: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct TokenClaims {
    exp: i64,
}

struct CachedToken {
    value: Zeroizing<String>,
    /// Unix seconds
    expires_at: i64,
}

impl CachedToken {
    fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Process-wide cache of the Aqua bearer token
///
/// Reads of a still-valid token only take the shared read lock. Refreshes are
/// serialized by `refresh` and re-check the cache after acquiring it, so concurrent
/// callers that find the token expired trigger a single login.
pub struct CredentialCache {
    http: reqwest::Client,
    login_url: String,
    identity: String,
    secret: Zeroizing<String>,
    token: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("login_url", &self.login_url)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl CredentialCache {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        identity: String,
        secret: Zeroizing<String>,
    ) -> Self {
        Self {
            http,
            login_url: format!("{}/api/v1/login", base_url.trim_end_matches('/')),
            identity,
            secret,
            token: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    async fn cached_token(&self) -> Option<String> {
        let now = chrono::Utc::now().timestamp();
        self.token
            .read()
            .await
            .as_ref()
            .filter(|token| !token.is_expired(now))
            .map(|token| token.value.to_string())
    }

    async fn login(&self) -> Result<CachedToken, AccessError> {
        info!(endpoint = %self.login_url, "Logging in to Aqua");

        let response = self
            .http
            .post(&self.login_url)
            .header(ACCEPT, "application/json")
            .json(&LoginRequest {
                id: &self.identity,
                password: self.secret.as_str(),
            })
            .send()
            .await
            .map_err(|source| AccessError::Transport {
                method: "POST",
                url: self.login_url.clone(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AccessError::Authentication {
                url: self.login_url.clone(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AccessError::Rejected {
                method: "POST",
                url: self.login_url.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let login: LoginResponse =
            response
                .json()
                .await
                .map_err(|e| AccessError::InvalidToken {
                    url: self.login_url.clone(),
                    reason: format!("unreadable login response: {e}"),
                })?;
        let expires_at =
            token_expiry(&login.token).map_err(|reason| AccessError::InvalidToken {
                url: self.login_url.clone(),
                reason,
            })?;

        debug!(expires_at, "Aqua token refreshed");
        Ok(CachedToken {
            value: Zeroizing::new(login.token),
            expires_at,
        })
    }
}

#[async_trait]
impl TokenSource for CredentialCache {
    async fn get_token(&self) -> Result<String, AccessError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _refresh_guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited for the guard
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        match self.login().await {
            Ok(fresh) => {
                metrics::increment_logins("success");
                let value = fresh.value.to_string();
                *self.token.write().await = Some(fresh);
                Ok(value)
            }
            Err(e) => {
                metrics::increment_logins(e.kind());
                warn!(endpoint = %self.login_url, error = %e, "Aqua login failed");
                *self.token.write().await = None;
                Err(e)
            }
        }
    }

    async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    fn endpoint(&self) -> &str {
        &self.login_url
    }
}

/// Read the `exp` claim of a JWT without verifying its signature
///
/// # Errors
///
/// Returns a description of the problem if the token is not a JWT or has no `exp` claim.
pub fn token_expiry(token: &str) -> Result<i64, String> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| "token is not a JWT".to_string())?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| format!("token payload is not base64url: {e}"))?;
    let claims: TokenClaims = serde_json::from_slice(&decoded)
        .map_err(|e| format!("token payload has no usable exp claim: {e}"))?;
    Ok(claims.exp)
}

/// A refused login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailure {
    pub endpoint: String,
    pub reason: String,
    /// When the failure was last confirmed
    pub recorded_at: Instant,
}

/// Outcome of the most recent login health check
///
/// Injected into the reconciler; while a failure is recorded every pass is halted with
/// a `Failed` status instead of hammering Aqua with credentials known to be bad. Only
/// refused credentials are recorded: an unreachable Aqua is retried per call. A recorded
/// failure becomes due for another check after `recheck_after`.
#[derive(Debug)]
pub struct LoginHealth {
    failure: std::sync::RwLock<Option<LoginFailure>>,
    recheck_after: Duration,
}

impl Default for LoginHealth {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_LOGIN_RECHECK_SECS))
    }
}

impl LoginHealth {
    pub fn new(recheck_after: Duration) -> Self {
        Self {
            failure: std::sync::RwLock::new(None),
            recheck_after,
        }
    }

    pub fn recheck_after(&self) -> Duration {
        self.recheck_after
    }

    /// Try to obtain a token and record the outcome
    ///
    /// Returns `true` only if a token was obtained.
    pub async fn check(&self, source: &dyn TokenSource) -> bool {
        let result = source.get_token().await.map(|_| ());
        match &result {
            Ok(()) => info!(endpoint = source.endpoint(), "Aqua login check passed"),
            Err(e) if e.is_authentication() => {
                error!(endpoint = source.endpoint(), error = %e, "Aqua refused the controller's credentials");
            }
            Err(e) => {
                warn!(endpoint = source.endpoint(), error = %e, "Aqua login check failed, retrying on demand");
            }
        }
        self.record_check(&result)
    }

    /// Record the outcome of a login check
    ///
    /// A success clears any recorded failure and an `Authentication` error records one.
    /// Other errors leave the recorded health unchanged.
    pub fn record_check(&self, result: &Result<(), AccessError>) -> bool {
        match result {
            Ok(()) => {
                self.record_success();
                true
            }
            Err(e) if e.is_authentication() => {
                self.record_failure(e.url(), &e.to_string());
                false
            }
            Err(_) => false,
        }
    }

    pub fn record_success(&self) {
        *self
            .failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn record_failure(&self, endpoint: &str, reason: &str) {
        *self
            .failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(LoginFailure {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
            recorded_at: Instant::now(),
        });
    }

    /// The recorded failure, if logging in is currently broken
    pub fn failure(&self) -> Option<LoginFailure> {
        self.failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Endpoint of the recorded failure, if logging in is currently broken
    pub fn broken_endpoint(&self) -> Option<String> {
        self.failure().map(|failure| failure.endpoint)
    }

    /// True when a failure is recorded and old enough to be checked again
    pub fn recheck_due(&self) -> bool {
        self.failure()
            .is_some_and(|failure| failure.recorded_at.elapsed() >= self.recheck_after)
    }
}
