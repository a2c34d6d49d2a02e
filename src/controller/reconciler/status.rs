//! # Status Management
//!
//! Merges partial status updates onto the stored `AquaScannerAccount` status and
//! persists the result.
//!
//! Every status mutation in a reconciliation pass goes through [`update_status`], which
//! applies three rules in order:
//!
//! 1. [`merge_status`]: fields present in the update win, absent fields keep their stored
//!    value, and a `desiredState` that is already set is never replaced.
//! 2. [`enforce_completion_law`]: `Complete` is only kept when every desired object is
//!    current.
//! 3. Writes that would change nothing but the timestamp are skipped, so the controller
//!    does not wake itself up with no-op watch events.

use crate::controller::reconciler::store::AccountStore;
use crate::crd::{AccountState, AquaScannerAccount, AquaScannerAccountStatus};
use anyhow::Result;
use tracing::debug;

/// Message recorded when a `Complete` status is demoted
pub const INCOMPLETE_MESSAGE: &str =
    "Account is not complete: provisioned Aqua objects differ from the desired state";

/// A string field counts as present only when it is non-empty
fn present(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Merge `update` onto `stored`
///
/// Pure: neither argument is modified.
pub fn merge_status(
    stored: &AquaScannerAccountStatus,
    update: &AquaScannerAccountStatus,
) -> AquaScannerAccountStatus {
    AquaScannerAccountStatus {
        state: update.state.or(stored.state),
        message: present(update.message.as_ref()).or_else(|| stored.message.clone()),
        timestamp: present(update.timestamp.as_ref()).or_else(|| stored.timestamp.clone()),
        account_name: present(update.account_name.as_ref())
            .or_else(|| stored.account_name.clone()),
        account_secret: present(update.account_secret.as_ref())
            .or_else(|| stored.account_secret.clone()),
        current_state: update.current_state.or(stored.current_state),
        desired_state: stored.desired_state.or(update.desired_state),
    }
}

/// Demote a `Complete` status whose current objects differ from the desired ones
pub fn enforce_completion_law(status: AquaScannerAccountStatus) -> AquaScannerAccountStatus {
    if status.state == Some(AccountState::Complete) && !status.is_converged() {
        return AquaScannerAccountStatus {
            state: Some(AccountState::Running),
            message: Some(INCOMPLETE_MESSAGE.to_string()),
            ..status
        };
    }
    status
}

fn same_ignoring_timestamp(a: &AquaScannerAccountStatus, b: &AquaScannerAccountStatus) -> bool {
    AquaScannerAccountStatus {
        timestamp: None,
        ..a.clone()
    } == AquaScannerAccountStatus {
        timestamp: None,
        ..b.clone()
    }
}

/// Merge `update` onto the account's status and persist it
///
/// Returns the account as stored afterwards, or the input unchanged when the merged
/// status would only differ by its timestamp. Such writes are skipped entirely, so the
/// timestamp records the last real change rather than the last pass that touched the
/// account.
///
/// # Errors
///
/// Returns an error if the store rejects the write (including conflicting writes).
pub async fn update_status(
    store: &dyn AccountStore,
    account: &AquaScannerAccount,
    update: &AquaScannerAccountStatus,
) -> Result<AquaScannerAccount> {
    let stored = account.status.clone().unwrap_or_default();
    let merged = enforce_completion_law(merge_status(&stored, update));

    if account.status.is_some() && same_ignoring_timestamp(&stored, &merged) {
        debug!(
            state = ?merged.state,
            "Skipping status update - status unchanged"
        );
        return Ok(account.clone());
    }

    let stamped = AquaScannerAccountStatus {
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
        ..merged
    };
    store.update_status(account, &stamped).await
}
