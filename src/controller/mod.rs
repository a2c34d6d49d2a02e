//! # Controller
//!
//! Reconciliation of `AquaScannerAccount` resources and the supporting pieces it needs:
//! error backoff, namespace contact lookup, password generation and the HTTP server
//! for metrics and health checks.

pub mod backoff;
pub mod contacts;
pub mod password;
pub mod reconciler;
pub mod server;
