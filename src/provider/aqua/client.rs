//! # Aqua HTTP Client
//!
//! Shared request plumbing for the per-object Aqua clients: bearer authentication,
//! JSON bodies, response message extraction, error classification and metrics.

use super::auth::TokenSource;
use crate::observability::metrics;
use crate::provider::AccessError;
use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use reqwest::{Client as ReqwestClient, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How an accepted response should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Accepted {
    /// The request changed the object
    Applied,
    /// The object was already in the requested state
    AlreadyInPlace,
}

#[derive(Deserialize)]
struct AquaMessage {
    #[serde(default)]
    message: String,
}

/// Build the reqwest client used for every Aqua call, login included
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client(timeout: Duration) -> Result<ReqwestClient> {
    ReqwestClient::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client for Aqua")
}

/// HTTP access to the Aqua API shared by the object clients
pub struct AquaHttp {
    http: ReqwestClient,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for AquaHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AquaHttp")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AquaHttp {
    pub fn new(http: ReqwestClient, base_url: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Obtain a token without touching any Aqua object
    pub async fn check_login(&self) -> Result<(), AccessError> {
        self.tokens.get_token().await.map(|_| ())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send `body` as JSON with `POST` and classify the response with `accept`
    pub(crate) async fn post<B>(
        &self,
        object: &'static str,
        operation: &'static str,
        path: &str,
        body: &B,
        accept: impl FnOnce(StatusCode, &str) -> Option<Accepted>,
    ) -> Result<Accepted, AccessError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let request = self.http.post(&url).json(body);
        self.dispatch(object, operation, "POST", url, request, accept)
            .await
    }

    /// Send a `DELETE` and classify the response with `accept`
    pub(crate) async fn delete(
        &self,
        object: &'static str,
        path: &str,
        accept: impl FnOnce(StatusCode, &str) -> Option<Accepted>,
    ) -> Result<Accepted, AccessError> {
        let url = self.url(path);
        let request = self.http.delete(&url);
        self.dispatch(object, "delete", "DELETE", url, request, accept)
            .await
    }

    async fn dispatch(
        &self,
        object: &'static str,
        operation: &'static str,
        method: &'static str,
        url: String,
        request: RequestBuilder,
        accept: impl FnOnce(StatusCode, &str) -> Option<Accepted>,
    ) -> Result<Accepted, AccessError> {
        let start = Instant::now();
        let result = self.exchange(method, url, request, accept).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_aqua_request(object, operation, outcome, start.elapsed().as_secs_f64());
        result
    }

    async fn exchange(
        &self,
        method: &'static str,
        url: String,
        request: RequestBuilder,
        accept: impl FnOnce(StatusCode, &str) -> Option<Accepted>,
    ) -> Result<Accepted, AccessError> {
        let token = self.tokens.get_token().await?;

        let response = match request
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(source) => {
                warn!(method, url = %url, error = %source, "Aqua API unreachable");
                return Err(AccessError::Transport {
                    method,
                    url,
                    source,
                });
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => {
                return Err(AccessError::Transport {
                    method,
                    url,
                    source,
                })
            }
        };
        let message = response_message(&body);
        debug!(method, url = %url, status = status.as_u16(), message = %message, "Aqua API responded");

        if let Some(accepted) = accept(status, &message) {
            return Ok(accepted);
        }

        if status == StatusCode::UNAUTHORIZED {
            // The token was refused before its expiry; force a fresh login next time
            self.tokens.invalidate().await;
        }

        warn!(method, url = %url, status = status.as_u16(), message = %message, "Aqua API rejected request");
        Err(AccessError::Rejected {
            method,
            url,
            status: status.as_u16(),
            message,
        })
    }
}

/// The `message` field of an Aqua JSON error body, or the raw body otherwise
pub(crate) fn response_message(body: &str) -> String {
    match serde_json::from_str::<AquaMessage>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => body.trim().to_string(),
    }
}
