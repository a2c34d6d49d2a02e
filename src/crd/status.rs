//! # AquaScannerAccount Status
//!
//! Status types for tracking provisioning progress of the four Aqua objects.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the AquaScannerAccount resource
///
/// Every field is optional so a partial status can be merged onto the stored one;
/// see `controller::reconciler::status::merge_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AquaScannerAccountStatus {
    /// Overall provisioning state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AccountState>,
    /// Human-readable explanation of the last transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Time of the last status mutation (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Aqua user name of the scanner account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    /// Aqua user password. Generated once and kept until the resource is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_secret: Option<String>,
    /// Objects confirmed created in Aqua
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<AquaObjectState>,
    /// Target state, set once on first observation and never changed afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_state: Option<AquaObjectState>,
}

impl AquaScannerAccountStatus {
    /// True when every desired object is also current
    pub fn is_converged(&self) -> bool {
        match (&self.current_state, &self.desired_state) {
            (Some(current), Some(desired)) => current == desired,
            _ => false,
        }
    }
}

/// Overall state of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum AccountState {
    New,
    Running,
    Complete,
    /// Older controller builds wrote `Failure`
    #[serde(alias = "Failure")]
    Failed,
}

impl AccountState {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountState::New => "New",
            AccountState::Running => "Running",
            AccountState::Complete => "Complete",
            AccountState::Failed => "Failed",
        }
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provisioning state of a single Aqua object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ObjectState {
    Created,
    #[default]
    #[serde(rename = "Not Created")]
    NotCreated,
}

/// One `ObjectState` per Aqua object managed for an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AquaObjectState {
    #[serde(default)]
    pub application_scope: ObjectState,
    #[serde(default)]
    pub role: ObjectState,
    #[serde(default)]
    pub permission_set: ObjectState,
    #[serde(default)]
    pub user: ObjectState,
}

impl AquaObjectState {
    pub fn all_created() -> Self {
        Self {
            application_scope: ObjectState::Created,
            role: ObjectState::Created,
            permission_set: ObjectState::Created,
            user: ObjectState::Created,
        }
    }

    pub fn all_not_created() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: SubResource) -> ObjectState {
        match kind {
            SubResource::ApplicationScope => self.application_scope,
            SubResource::PermissionSet => self.permission_set,
            SubResource::Role => self.role,
            SubResource::User => self.user,
        }
    }

    /// Copy of `self` with one object's state replaced
    #[must_use]
    pub fn with(mut self, kind: SubResource, state: ObjectState) -> Self {
        match kind {
            SubResource::ApplicationScope => self.application_scope = state,
            SubResource::PermissionSet => self.permission_set = state,
            SubResource::Role => self.role = state,
            SubResource::User => self.user = state,
        }
        self
    }
}

/// The Aqua objects provisioned per account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResource {
    ApplicationScope,
    PermissionSet,
    Role,
    User,
}

impl SubResource {
    /// Creation order. The role references the scope and permission set by name and
    /// the user references the role.
    pub const PROVISIONING_ORDER: [SubResource; 4] = [
        SubResource::ApplicationScope,
        SubResource::PermissionSet,
        SubResource::Role,
        SubResource::User,
    ];

    /// Deletion order used by the finalizer
    pub const TEARDOWN_ORDER: [SubResource; 4] = [
        SubResource::User,
        SubResource::Role,
        SubResource::ApplicationScope,
        SubResource::PermissionSet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubResource::ApplicationScope => "ApplicationScope",
            SubResource::PermissionSet => "PermissionSet",
            SubResource::Role => "Role",
            SubResource::User => "User",
        }
    }

    /// Lowercase label used in metrics
    pub fn metric_label(self) -> &'static str {
        match self {
            SubResource::ApplicationScope => "application_scope",
            SubResource::PermissionSet => "permission_set",
            SubResource::Role => "role",
            SubResource::User => "user",
        }
    }
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
