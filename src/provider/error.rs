//! # Access Management Errors
//!
//! Classification of failures talking to the access-management API.

use thiserror::Error;

/// Error returned by the access-management clients
#[derive(Debug, Error)]
pub enum AccessError {
    /// The API could not be reached (DNS, TLS, connection refused, timeout)
    #[error("transport error calling {method} {url}: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The API answered with a non-success status that is not an idempotent outcome
    #[error("{method} {url} was rejected with status {status}: {message}")]
    Rejected {
        method: &'static str,
        url: String,
        status: u16,
        message: String,
    },
    /// The login endpoint refused the configured credentials
    #[error("login to {url} was refused with status {status}")]
    Authentication { url: String, status: u16 },
    /// The login endpoint answered but its token could not be used
    #[error("invalid token returned by {url}: {reason}")]
    InvalidToken { url: String, reason: String },
}

impl AccessError {
    /// True when the API was unreachable
    pub fn is_transport(&self) -> bool {
        matches!(self, AccessError::Transport { .. })
    }

    /// True when the configured credentials were refused
    pub fn is_authentication(&self) -> bool {
        matches!(self, AccessError::Authentication { .. })
    }

    /// URL of the failing request
    pub fn url(&self) -> &str {
        match self {
            AccessError::Transport { url, .. }
            | AccessError::Rejected { url, .. }
            | AccessError::Authentication { url, .. }
            | AccessError::InvalidToken { url, .. } => url,
        }
    }

    /// Short label used in metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AccessError::Transport { .. } => "transport",
            AccessError::Rejected { .. } => "rejected",
            AccessError::Authentication { .. } => "authentication",
            AccessError::InvalidToken { .. } => "invalid_token",
        }
    }
}
