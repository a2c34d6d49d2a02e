//! # Application Scope Client
//!
//! Application scopes restrict the scanner account to images of its own team.

use super::client::{Accepted, AquaHttp};
use super::requests::ScopeRequest;
use crate::provider::{AccessError, ApplicationScopeSpec};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::info;

const OBJECT: &str = "application_scope";
const SCOPES_PATH: &str = "/api/v2/access_management/scopes";
/// Aqua only offers bulk deletion for scopes
const SCOPES_DELETE_PATH: &str = "/api/v2/access_management/scopes/delete";

#[derive(Debug, Clone)]
pub struct ScopeClient {
    http: Arc<AquaHttp>,
}

impl ScopeClient {
    pub fn new(http: Arc<AquaHttp>) -> Self {
        Self { http }
    }

    pub async fn create(&self, scope: &ApplicationScopeSpec) -> Result<(), AccessError> {
        info!(scope = %scope.name, repositories = %format!("{}-*", scope.namespace_prefix), "Creating application scope in Aqua");
        let already_exists = format!("application scope {} already exists", scope.name);

        let accepted = self
            .http
            .post(
                OBJECT,
                "create",
                SCOPES_PATH,
                &ScopeRequest::from(scope),
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
            info!(scope = %scope.name, "Application scope already exists in Aqua");
        }
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), AccessError> {
        info!(scope = %name, "Deleting application scope in Aqua");

        let accepted = self
            .http
            .post(OBJECT, "delete", SCOPES_DELETE_PATH, &[name], |status, _| {
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
            info!(scope = %name, "Application scope was already absent from Aqua");
        }
        Ok(())
    }
}
