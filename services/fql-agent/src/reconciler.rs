//! Reconciliation entry point and the loop that drives it.
//!
//! The reconciler:
//! - Loads the cluster spec fresh for every pass
//! - Interprets it into a desired state (rejecting infeasible requests)
//! - Converges every node toward that state
//! - Schedules the next pass according to the pass outcome

use std::sync::Arc;
use std::time::Duration;

use fqlsync_reconcile::{ReconcileResult, RetryTracker, DEFAULT_RETRY_WINDOW};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::converge::{FleetConvergence, FqlReconcileResult};
use crate::interpret::interpret;
use crate::mgmt::ManagementApi;
use crate::nodes::{ClusterSelector, NodeEnumerator};
use crate::spec::{ClusterSpec, SpecSource};

/// Reconciliation loop configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between passes after `Continue` or `Error`.
    pub reconcile_interval: Duration,

    /// Consecutive requeues tolerated before escalating the log level.
    pub max_requeues: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: fqlsync_reconcile::DEFAULT_RECONCILE_INTERVAL,
            max_requeues: fqlsync_reconcile::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Full query logging reconciler for one cluster spec source.
pub struct Reconciler {
    spec_source: Arc<dyn SpecSource>,
    convergence: FleetConvergence,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        spec_source: Arc<dyn SpecSource>,
        nodes: Arc<dyn NodeEnumerator>,
        mgmt: Arc<dyn ManagementApi>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            spec_source,
            convergence: FleetConvergence::new(nodes, mgmt),
            config,
        }
    }

    /// Perform a single pass against an already loaded spec.
    ///
    /// The desired state is derived once here and handed to convergence by
    /// value; no node is contacted when derivation fails.
    #[instrument(skip(self, spec), fields(cluster = %spec.cluster_name))]
    pub async fn reconcile(&self, spec: &ClusterSpec) -> FqlReconcileResult {
        let desired = match interpret(spec) {
            Ok(desired) => desired,
            Err(e) => return ReconcileResult::Error(e),
        };

        let selector = ClusterSelector::new(spec.cluster_name.clone());
        self.convergence.converge(&selector, desired).await
    }

    /// Load the spec and perform a single pass.
    pub async fn run_once(&self) -> anyhow::Result<FqlReconcileResult> {
        let spec = self.spec_source.load().await?;
        Ok(self.reconcile(&spec).await)
    }

    /// Run passes until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            reconcile_interval_secs = self.config.reconcile_interval.as_secs(),
            max_requeues = self.config.max_requeues,
            "Starting full query logging reconciliation loop"
        );

        let mut retries = RetryTracker::new(self.config.max_requeues, DEFAULT_RETRY_WINDOW);

        loop {
            let delay = match self.run_once().await {
                Ok(outcome) => schedule_next_pass(&self.config, &outcome, &mut retries).delay,
                Err(e) => {
                    error!(error = %e, "Failed to load cluster spec");
                    self.config.reconcile_interval
                }
            };

            debug!(delay_ms = delay.as_millis() as u64, "Next reconciliation pass scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    // A dropped sender can never signal again; treat it as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reconciler shutting down");
                        break;
                    }
                }
            }
        }
    }
}

const RETRY_KEY: &str = "full_query_logging";

/// When the next pass runs, and whether requeues have piled up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextPass {
    pub delay: Duration,
    pub escalated: bool,
}

/// Log the outcome of a pass and pick the delay before the next one.
///
/// `RequeueAfter` uses its own delay; `Continue` and `Error` wait for the
/// reconcile interval and reset the requeue count.
pub fn schedule_next_pass(
    config: &ReconcilerConfig,
    outcome: &FqlReconcileResult,
    retries: &mut RetryTracker,
) -> NextPass {
    match outcome {
        ReconcileResult::Continue => {
            retries.clear(RETRY_KEY);
            debug!("Full query logging pass complete");
            NextPass {
                delay: config.reconcile_interval,
                escalated: false,
            }
        }
        ReconcileResult::Error(e) => {
            retries.clear(RETRY_KEY);
            error!(
                error = %e,
                reason_code = e.reason_code(),
                "Full query logging reconciliation failed"
            );
            NextPass {
                delay: config.reconcile_interval,
                escalated: false,
            }
        }
        ReconcileResult::RequeueAfter(delay) => {
            let escalated = retries.record_failure(RETRY_KEY);
            let consecutive_requeues = retries.failure_count(RETRY_KEY);
            if escalated {
                error!(
                    consecutive_requeues,
                    delay_ms = delay.as_millis() as u64,
                    "Full query logging keeps requeueing"
                );
            } else {
                warn!(
                    consecutive_requeues,
                    delay_ms = delay.as_millis() as u64,
                    "Full query logging pass requeued"
                );
            }
            NextPass {
                delay: *delay,
                escalated,
            }
        }
    }
}

/// Process exit status for a single pass: 0 converged, 1 error, 2 requeue.
pub fn exit_status(outcome: &FqlReconcileResult) -> u8 {
    match outcome {
        ReconcileResult::Continue => 0,
        ReconcileResult::Error(_) => 1,
        ReconcileResult::RequeueAfter(_) => 2,
    }
}
