//! # Aqua Request Payloads
//!
//! Typed request bodies for the Aqua access-management API, built from the provider
//! domain specs.

use crate::provider::{ApplicationScopeSpec, PermissionSetSpec, RoleSpec, UserSpec};
use serde::Serialize;

/// Registry every scanner scope is restricted to
pub const SCOPE_REGISTRY: &str = "Docker Hub";

/// Actions granted to the scanner permission set
pub const SCANNER_ACTIONS: [&str; 4] = [
    "images.read",
    "images.create",
    "image_assurance.read",
    "risks.vulnerabilities.read",
];

#[derive(Debug, Serialize)]
pub(crate) struct ScopeRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<&'a str>,
    pub categories: ScopeCategories,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScopeCategories {
    pub artifacts: ScopeArtifacts,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScopeArtifacts {
    pub image: ScopeExpression,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScopeExpression {
    pub expression: String,
    pub variables: Vec<ScopeVariable>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScopeVariable {
    pub attribute: &'static str,
    pub value: String,
}

impl<'a> From<&'a ApplicationScopeSpec> for ScopeRequest<'a> {
    fn from(scope: &'a ApplicationScopeSpec) -> Self {
        Self {
            name: &scope.name,
            description: &scope.description,
            owner_email: scope.technical_lead_email.as_deref(),
            categories: ScopeCategories {
                artifacts: ScopeArtifacts {
                    image: ScopeExpression {
                        expression: "v1 && v2".to_string(),
                        variables: vec![
                            ScopeVariable {
                                attribute: "aqua.registry",
                                value: SCOPE_REGISTRY.to_string(),
                            },
                            ScopeVariable {
                                attribute: "image.repo",
                                value: format!("{}-*", scope.namespace_prefix),
                            },
                        ],
                    },
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PermissionSetRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a str>,
    pub ui_access: bool,
    pub is_super: bool,
    pub actions: &'static [&'static str],
}

impl<'a> From<&'a PermissionSetSpec> for PermissionSetRequest<'a> {
    fn from(permission_set: &'a PermissionSetSpec) -> Self {
        Self {
            name: &permission_set.name,
            description: &permission_set.description,
            author: permission_set.technical_lead_email.as_deref(),
            ui_access: false,
            is_super: false,
            actions: &SCANNER_ACTIONS,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RoleRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub permission: &'a str,
    pub scopes: [&'a str; 1],
}

impl<'a> From<&'a RoleSpec> for RoleRequest<'a> {
    fn from(role: &'a RoleSpec) -> Self {
        Self {
            name: &role.name,
            description: &role.description,
            permission: &role.permission_set,
            scopes: [&role.application_scope],
        }
    }
}

#[derive(Serialize)]
pub(crate) struct UserRequest<'a> {
    pub id: &'a str,
    pub password: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    pub roles: [&'a str; 1],
    pub first_time: bool,
}

impl<'a> From<&'a UserSpec> for UserRequest<'a> {
    fn from(user: &'a UserSpec) -> Self {
        Self {
            id: &user.name,
            password: &user.password,
            name: &user.name,
            email: user.email.as_deref(),
            roles: [&user.role],
            first_time: false,
        }
    }
}

impl std::fmt::Debug for UserRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRequest")
            .field("id", &self.id)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}
