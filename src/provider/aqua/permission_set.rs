//! # Permission Set Client

use super::client::{Accepted, AquaHttp};
use super::requests::PermissionSetRequest;
use crate::provider::{AccessError, PermissionSetSpec};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::info;

const OBJECT: &str = "permission_set";
const PERMISSIONS_PATH: &str = "/api/v2/access_management/permissions";

#[derive(Debug, Clone)]
pub struct PermissionSetClient {
    http: Arc<AquaHttp>,
}

impl PermissionSetClient {
    pub fn new(http: Arc<AquaHttp>) -> Self {
        Self { http }
    }

    pub async fn create(&self, permission_set: &PermissionSetSpec) -> Result<(), AccessError> {
        info!(permission_set = %permission_set.name, "Creating permission set in Aqua");
        let already_exists = format!("permission {} already exists", permission_set.name);

        let accepted = self
            .http
            .post(
                OBJECT,
                "create",
                PERMISSIONS_PATH,
                &PermissionSetRequest::from(permission_set),
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
            info!(permission_set = %permission_set.name, "Permission set already exists in Aqua");
        }
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), AccessError> {
        info!(permission_set = %name, "Deleting permission set in Aqua");

        let accepted = self
            .http
            .delete(OBJECT, &format!("{PERMISSIONS_PATH}/{name}"), |status, _| {
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
            info!(permission_set = %name, "Permission set was already absent from Aqua");
        }
        Ok(())
    }
}
