//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables (populated from a
//! ConfigMap and the Aqua credentials Secret).
//!
//! Everything except the Aqua endpoint and credentials has a sensible default and can be
//! overridden via environment variables.

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

use anyhow::Result;

/// Load configuration from environment variables with defaults
///
/// # Errors
///
/// Returns an error if a required variable is missing or a value is invalid.
pub fn load_config() -> Result<(ControllerConfig, ServerConfig)> {
    Ok((ControllerConfig::from_env()?, ServerConfig::from_env()))
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
