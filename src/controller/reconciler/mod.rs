//! # Reconciler
//!
//! Drives an `AquaScannerAccount` towards its desired Aqua objects.
//!
//! ## Components
//!
//! - `types` - reconciler context, errors and pass outcomes
//! - `store` - control-plane access for accounts and namespaces
//! - `status` - status merge and persistence
//! - `reconcile` - the provisioning and finalization state machine

pub mod reconcile;
pub mod status;
pub mod store;
mod types;

pub use reconcile::reconcile;
pub use store::{has_finalizer, with_finalizer, without_finalizer, AccountStore, KubeAccountStore};
pub use types::*;
