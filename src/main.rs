//! # Aqua Scanner Account Controller
//!
//! A Kubernetes controller that provisions Aqua scanner service accounts.
//!
//! ## Overview
//!
//! For every `AquaScannerAccount` resource the controller converges four Aqua
//! access-management objects:
//!
//! 1. **Application scope** - restricts the scanner to the team's images
//! 2. **Permission set** - the scanning actions the account may perform
//! 3. **Role** - binds the scope to the permission set
//! 4. **User** - the CLI credential, published in the resource status
//!
//! Progress is recorded per object in the resource status so an interrupted pass
//! resumes where it stopped. Deleting the resource removes all four objects before
//! the finalizer is released.
//!
//! ## Features
//!
//! - **Level-triggered**: every pass re-evaluates desired vs current state
//! - **Idempotent clients**: "already exists" and "not found" responses are successes
//! - **Shared credential cache**: one Aqua login shared by all reconciliations
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health checks**: HTTP endpoints for liveness and readiness checks

use anyhow::Result;

use aqua_scanner_account_controller::runtime::initialization::initialize;
use aqua_scanner_account_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the controller runtime
    let init_result = initialize().await?;

    // Run the watch loop
    run_watch_loop(init_result.accounts, init_result.reconciler).await?;

    Ok(())
}
