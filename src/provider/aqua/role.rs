//! # Role Client
//!
//! A role binds the account's application scope to its permission set. Both must exist
//! in Aqua before the role can be created.

use super::client::{Accepted, AquaHttp};
use super::requests::RoleRequest;
use crate::provider::{AccessError, RoleSpec};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::info;

const OBJECT: &str = "role";
const ROLES_PATH: &str = "/api/v2/access_management/roles";

#[derive(Debug, Clone)]
pub struct RoleClient {
    http: Arc<AquaHttp>,
}

impl RoleClient {
    pub fn new(http: Arc<AquaHttp>) -> Self {
        Self { http }
    }

    pub async fn create(&self, role: &RoleSpec) -> Result<(), AccessError> {
        info!(
            role = %role.name,
            scope = %role.application_scope,
            permission_set = %role.permission_set,
            "Creating role in Aqua"
        );
        let already_exists = format!("role {} already exists", role.name);

        let accepted = self
            .http
            .post(
                OBJECT,
                "create",
                ROLES_PATH,
                &RoleRequest::from(role),
                |status, message| {
                    if status.is_success() {
                        Some(Accepted::Applied)
                    } else if status == StatusCode::NOT_FOUND && message.contains(&already_exists) {
                        Some(Accepted::AlreadyInPlace)
                    } else {
                        None
                    }
                },
            )
            .await?;

        if accepted == Accepted::AlreadyInPlace {
            info!(role = %role.name, "Role already exists in Aqua");
        }
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), AccessError> {
        info!(role = %name, "Deleting role in Aqua");

        let accepted = self
            .http
            .delete(OBJECT, &format!("{ROLES_PATH}/{name}"), |status, _| {
                if status.is_success() {
                    Some(Accepted::Applied)
                } else if status == StatusCode::NOT_FOUND {
                    Some(Accepted::AlreadyInPlace)
                } else {
                    None
                }
            })
            .await?;

        if accepted == Accepted::AlreadyInPlace {
            info!(role = %name, "Role was already absent from Aqua");
        }
        Ok(())
    }
}
