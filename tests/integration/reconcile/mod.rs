//! Reconciler integration tests
//!
//! Organized by the phase of the account lifecycle they exercise.

pub mod common;
pub mod finalization;
pub mod provisioning;
