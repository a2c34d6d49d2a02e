//! # Error Policy
//!
//! Requeue policy for failed reconciliations.

use crate::constants;
use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::AquaScannerAccount;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per account so one failing account does not slow down the
/// retries of another. A successful pass clears it.
pub fn handle_reconciliation_error(
    account: Arc<AquaScannerAccount>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = account.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = account.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    observability::metrics::increment_reconciliation_errors();

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key).or_insert_with(|| {
                BackoffState::new(
                    ctx.settings.backoff_min_secs,
                    ctx.settings.backoff_max_secs,
                )
            });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!(
                "Failed to lock backoff_states: {}, using default backoff",
                e
            );
            (constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, 0)
        }
    };

    info!(
        "Retrying {}/{} in {}s (error count: {})",
        namespace, name, backoff_seconds, error_count
    );

    observability::metrics::increment_requeues_total(requeue_reason(error));
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Metric label for the requeue reason
pub fn requeue_reason(error: &ReconcilerError) -> &'static str {
    match error {
        ReconcilerError::Store(_) => "store",
        ReconcilerError::Provisioning { source, .. } if source.is_transport() => {
            "aqua-unreachable"
        }
        ReconcilerError::Provisioning { .. } => "provisioning",
        ReconcilerError::Finalization(_) => "finalization",
        ReconcilerError::Password(_) => "password-policy",
    }
}
