//! # Access Management Providers
//!
//! The external access-management system the controller provisions scanner accounts in.
//!
//! The reconciler only sees the [`AccessProvider`] trait; the Aqua implementation lives
//! in [`aqua`]. Every operation is idempotent: creating an object that already exists
//! and deleting one that is already gone both succeed.

pub mod aqua;
mod error;

pub use error::AccessError;

use async_trait::async_trait;

/// Application scope limiting what the scanner account can see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationScopeSpec {
    pub name: String,
    pub description: String,
    /// Namespace prefix the scope's image repository expression is built from
    pub namespace_prefix: String,
    pub technical_lead_email: Option<String>,
}

/// Set of actions the scanner account is allowed to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSetSpec {
    pub name: String,
    pub description: String,
    pub technical_lead_email: Option<String>,
}

/// Role binding an application scope to a permission set, both referenced by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub description: String,
    pub application_scope: String,
    pub permission_set: String,
}

/// The scanner user, referencing its role by name
#[derive(Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub name: String,
    pub role: String,
    pub password: String,
    pub email: Option<String>,
}

impl std::fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSpec")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Trait for access-management providers
#[async_trait]
pub trait AccessProvider: Send + Sync {
    /// Log in without changing anything, to find out whether the credentials work
    async fn check_login(&self) -> Result<(), AccessError>;

    /// Create an application scope; succeeds if it already exists
    async fn create_application_scope(&self, scope: &ApplicationScopeSpec)
        -> Result<(), AccessError>;

    /// Delete an application scope; succeeds if it does not exist
    async fn delete_application_scope(&self, name: &str) -> Result<(), AccessError>;

    /// Create a permission set; succeeds if it already exists
    async fn create_permission_set(&self, permission_set: &PermissionSetSpec)
        -> Result<(), AccessError>;

    /// Delete a permission set; succeeds if it does not exist
    async fn delete_permission_set(&self, name: &str) -> Result<(), AccessError>;

    /// Create a role; the referenced scope and permission set must exist
    async fn create_role(&self, role: &RoleSpec) -> Result<(), AccessError>;

    /// Delete a role; succeeds if it does not exist
    async fn delete_role(&self, name: &str) -> Result<(), AccessError>;

    /// Create a user; the referenced role must exist
    async fn create_user(&self, user: &UserSpec) -> Result<(), AccessError>;

    /// Delete a user; succeeds if it does not exist
    async fn delete_user(&self, name: &str) -> Result<(), AccessError>;
}
