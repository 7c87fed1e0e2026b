//! fqlsync agent
//!
//! Periodically converges full query logging across a cluster's nodes.
//!
//! ## Architecture
//!
//! - **Spec source**: Cluster spec re-read from disk every pass
//! - **Node enumerator**: Node inventory re-read from disk every pass
//! - **Management client**: Talks to each node's management API
//! - **Reconciler**: Runs passes and honours requeue requests

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use fqlsync_agent::config::Config;
use fqlsync_agent::nodes::FileNodeEnumerator;
use fqlsync_agent::reconciler::exit_status;
use fqlsync_agent::spec::FileSpecSource;
use fqlsync_agent::{MgmtApiClient, Reconciler, ReconcilerConfig};
use fqlsync_reconcile::ReconcileResult;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        spec_file = %config.spec_file.display(),
        nodes_file = %config.nodes_file.display(),
        mgmt_port = config.mgmt_port,
        once = config.once,
        "Starting fqlsync agent"
    );

    let mgmt = MgmtApiClient::new(&config).context("Failed to build management API client")?;
    let reconciler = Reconciler::new(
        Arc::new(FileSpecSource::new(&config.spec_file)),
        Arc::new(FileNodeEnumerator::new(&config.nodes_file)),
        Arc::new(mgmt),
        ReconcilerConfig {
            reconcile_interval: config.reconcile_interval,
            max_requeues: config.max_requeues,
        },
    );

    if config.once {
        let outcome = reconciler.run_once().await?;
        match &outcome {
            ReconcileResult::Continue => info!("Full query logging converged"),
            ReconcileResult::Error(e) => {
                error!(error = %e, reason_code = e.reason_code(), "Full query logging reconciliation failed")
            }
            ReconcileResult::RequeueAfter(delay) => {
                warn!(delay_ms = delay.as_millis() as u64, "Full query logging needs another pass")
            }
        }
        return Ok(ExitCode::from(exit_status(&outcome)));
    }

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reconciler_handle = tokio::spawn(async move {
        reconciler.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    if let Err(e) = reconciler_handle.await {
        error!(error = %e, "Reconciler task panicked");
    }

    info!("fqlsync agent shutdown complete");
    Ok(ExitCode::SUCCESS)
}
