//! # User Client
//!
//! The scanner user lives in Aqua's v1 user API, which reports conflicts and missing
//! users differently from the v2 access-management endpoints.

use super::client::{Accepted, AquaHttp};
use super::requests::UserRequest;
use crate::provider::{AccessError, UserSpec};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::info;

const OBJECT: &str = "user";
const USERS_PATH: &str = "/api/v1/users";
const NO_SUCH_USER: &str = "No such user";

#[derive(Debug, Clone)]
pub struct UserClient {
    http: Arc<AquaHttp>,
}

impl UserClient {
    pub fn new(http: Arc<AquaHttp>) -> Self {
        Self { http }
    }

    pub async fn create(&self, user: &UserSpec) -> Result<(), AccessError> {
        info!(user = %user.name, role = %user.role, "Creating user in Aqua");
        let already_exists = format!("User with username {} already exists", user.name);

        let accepted = self
            .http
            .post(
                OBJECT,
                "create",
                USERS_PATH,
                &UserRequest::from(user),
                |status, message| {
                    if status.is_success() {
                        Some(Accepted::Applied)
                    } else if status == StatusCode::BAD_REQUEST && message.contains(&already_exists)
                    {
                        Some(Accepted::AlreadyInPlace)
                    } else {
                        None
                    }
                },
            )
            .await?;

        match accepted {
            Accepted::Applied => info!(user = %user.name, "User created in Aqua"),
            Accepted::AlreadyInPlace => info!(user = %user.name, "User already exists in Aqua"),
        }
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), AccessError> {
        info!(user = %name, "Deleting user in Aqua");

        let accepted = self
            .http
            .delete(OBJECT, &format!("{USERS_PATH}/{name}"), |status, message| {
                if status.is_success() {
                    Some(Accepted::Applied)
                } else if status == StatusCode::NOT_FOUND
                    || (status == StatusCode::BAD_REQUEST && message.contains(NO_SUCH_USER))
                {
                    Some(Accepted::AlreadyInPlace)
                } else {
                    None
                }
            })
            .await?;

        match accepted {
            Accepted::Applied => info!(user = %name, "User deleted from Aqua"),
            Accepted::AlreadyInPlace => info!(user = %name, "User was already absent from Aqua"),
        }
        Ok(())
    }
}
