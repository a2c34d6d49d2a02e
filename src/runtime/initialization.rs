//! # Initialization
//!
//! Controller start-up: rustls setup, tracing, configuration, metrics, server startup,
//! the Aqua login check and Kubernetes client setup.

use crate::config::{load_config, ServerConfig};
use crate::controller::reconciler::{KubeAccountStore, Reconciler, ReconcilerSettings};
use crate::controller::server::{start_server, ServerState};
use crate::crd::AquaScannerAccount;
use crate::observability;
use crate::provider::aqua::{build_http_client, AquaHttp, AquaProvider, CredentialCache, LoginHealth};
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// API for AquaScannerAccount CRD
    pub accounts: Api<AquaScannerAccount>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Configuration loading
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Aqua login check
/// - Reconciler setup
///
/// # Errors
///
/// Returns an error if configuration is invalid, the server cannot start, or no
/// Kubernetes client can be created. A failed Aqua login is not fatal: refused
/// credentials are recorded and reported on every account until a later check passes,
/// and an unreachable Aqua is simply retried by the first reconciliations.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before any rustls client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aqua_scanner_account_controller=info".into()),
        )
        .init();

    info!("Starting Aqua Scanner Account Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let (controller_config, server_config) =
        load_config().context("Failed to load controller configuration")?;
    info!(config = ?controller_config, "Loaded controller configuration");

    observability::metrics::register_metrics()?;

    // Start HTTP server for metrics and health checks
    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });

    // Readiness checks should pass as soon as the controller starts watching
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    // Accounts may live in any namespace; the reconciler rejects the wrong ones
    let accounts: Api<AquaScannerAccount> = Api::all(client.clone());

    let http = build_http_client(Duration::from_secs(controller_config.http_timeout_secs))?;
    let credentials = Arc::new(CredentialCache::new(
        http.clone(),
        &controller_config.aqua_url,
        controller_config.aqua_user.clone(),
        controller_config.aqua_password.clone(),
    ));

    let login_health = Arc::new(LoginHealth::new(Duration::from_secs(
        controller_config.login_recheck_secs,
    )));
    if !login_health.check(credentials.as_ref()).await && login_health.failure().is_some() {
        warn!(
            "Aqua refused the controller's credentials at {}; accounts will be marked Failed, login is retried every {}s",
            controller_config.aqua_url, controller_config.login_recheck_secs
        );
    }

    let aqua = Arc::new(AquaHttp::new(http, &controller_config.aqua_url, credentials));
    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeAccountStore::new(client.clone())),
        Arc::new(AquaProvider::new(aqua)),
        login_health,
        ReconcilerSettings::from(&controller_config),
    ));

    log_existing_accounts(&accounts).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        accounts,
        reconciler,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state
            .is_ready
            .load(std::sync::atomic::Ordering::Relaxed)
        {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}

/// Check the CRD is installed and log the accounts that already exist
///
/// The watch loop's initial list reconciles every one of them.
async fn log_existing_accounts(accounts: &Api<AquaScannerAccount>) {
    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.existing_accounts",
        operation = "log_existing_accounts"
    );
    let _guard = span.enter();

    match accounts.list(&ListParams::default()).await {
        Ok(list) => {
            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.metadata.namespace.clone().unwrap_or_default())
                    .or_default()
                    .push(item.metadata.name.clone().unwrap_or_default());
            }

            info!(
                "CRD is queryable, found {} existing AquaScannerAccount resources in {} namespaces",
                list.items.len(),
                by_namespace.len()
            );
            for (namespace, names) in &by_namespace {
                info!("Namespace {}: {}", namespace, names.join(", "));
            }
        }
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}
