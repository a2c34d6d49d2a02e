//! # Aqua Provider
//!
//! [`AccessProvider`] implementation for the Aqua access-management REST API.
//!
//! ## Components
//!
//! - `auth` - login, bearer token cache and login health
//! - `client` - shared HTTP plumbing
//! - `requests` - request payloads
//! - `scope`, `permission_set`, `role`, `user` - one client per Aqua object

pub mod auth;
pub mod client;
mod permission_set;
mod requests;
mod role;
mod scope;
mod user;

pub use auth::{CredentialCache, LoginFailure, LoginHealth, TokenSource};
pub use client::{build_http_client, AquaHttp};
pub use permission_set::PermissionSetClient;
pub use requests::{SCANNER_ACTIONS, SCOPE_REGISTRY};
pub use role::RoleClient;
pub use scope::ScopeClient;
pub use user::UserClient;

use crate::provider::{
    AccessError, AccessProvider, ApplicationScopeSpec, PermissionSetSpec, RoleSpec, UserSpec,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Aqua access-management provider
#[derive(Debug, Clone)]
pub struct AquaProvider {
    http: Arc<AquaHttp>,
    scopes: ScopeClient,
    permission_sets: PermissionSetClient,
    roles: RoleClient,
    users: UserClient,
}

impl AquaProvider {
    /// Build the provider over a shared HTTP client and token source
    pub fn new(http: Arc<AquaHttp>) -> Self {
        Self {
            scopes: ScopeClient::new(Arc::clone(&http)),
            permission_sets: PermissionSetClient::new(Arc::clone(&http)),
            roles: RoleClient::new(Arc::clone(&http)),
            users: UserClient::new(Arc::clone(&http)),
            http,
        }
    }
}

#[async_trait]
impl AccessProvider for AquaProvider {
    async fn check_login(&self) -> Result<(), AccessError> {
        self.http.check_login().await
    }

    async fn create_application_scope(
        &self,
        scope: &ApplicationScopeSpec,
    ) -> Result<(), AccessError> {
        self.scopes.create(scope).await
    }

    async fn delete_application_scope(&self, name: &str) -> Result<(), AccessError> {
        self.scopes.delete(name).await
    }

    async fn create_permission_set(
        &self,
        permission_set: &PermissionSetSpec,
    ) -> Result<(), AccessError> {
        self.permission_sets.create(permission_set).await
    }

    async fn delete_permission_set(&self, name: &str) -> Result<(), AccessError> {
        self.permission_sets.delete(name).await
    }

    async fn create_role(&self, role: &RoleSpec) -> Result<(), AccessError> {
        self.roles.create(role).await
    }

    async fn delete_role(&self, name: &str) -> Result<(), AccessError> {
        self.roles.delete(name).await
    }

    async fn create_user(&self, user: &UserSpec) -> Result<(), AccessError> {
        self.users.create(user).await
    }

    async fn delete_user(&self, name: &str) -> Result<(), AccessError> {
        self.users.delete(name).await
    }
}
