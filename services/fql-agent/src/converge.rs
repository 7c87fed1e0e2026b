//! Fleet convergence for full query logging.
//!
//! Nodes are visited one at a time in enumeration order. Every per-node
//! operation is idempotent, so any transient failure simply ends the pass
//! with a requeue and the next pass starts over from the first node.

use std::ops::ControlFlow;
use std::sync::Arc;

use fqlsync_reconcile::{ReconcileResult, SHORT_REQUEUE_DELAY};
use tracing::{debug, error, info, warn};

use crate::error::FqlError;
use crate::interpret::DesiredState;
use crate::mgmt::{Feature, ManagementApi};
use crate::nodes::{ClusterSelector, Node, NodeEnumerator};

/// Outcome type of a full query logging pass.
pub type FqlReconcileResult = ReconcileResult<FqlError>;

/// Per-node step: keep going, or stop the sweep with a final outcome.
type NodeStep = ControlFlow<FqlReconcileResult>;

/// Converges full query logging across every node of a cluster.
pub struct FleetConvergence {
    nodes: Arc<dyn NodeEnumerator>,
    mgmt: Arc<dyn ManagementApi>,
}

impl FleetConvergence {
    pub fn new(nodes: Arc<dyn NodeEnumerator>, mgmt: Arc<dyn ManagementApi>) -> Self {
        Self { nodes, mgmt }
    }

    /// Run one convergence sweep toward `desired`.
    pub async fn converge(
        &self,
        selector: &ClusterSelector,
        desired: DesiredState,
    ) -> FqlReconcileResult {
        if !desired.fql_capable_version() {
            debug!(
                major_version = desired.major_version,
                "Full query logging not available for this server version, skipping"
            );
            return ReconcileResult::Continue;
        }

        info!(
            cluster = %selector.cluster_name,
            major_version = desired.major_version,
            enabled = desired.enabled,
            "Converging full query logging"
        );

        let nodes = match self.nodes.list_nodes(selector).await {
            Ok(nodes) => nodes,
            Err(e) => {
                error!(
                    cluster = %selector.cluster_name,
                    error = %e,
                    "Failed to list cluster nodes for full query logging"
                );
                return ReconcileResult::RequeueAfter(SHORT_REQUEUE_DELAY);
            }
        };

        let mut step = NodeStep::Continue(());
        for node in &nodes {
            step = self.converge_node(node, desired.enabled).await;
            if step.is_break() {
                break;
            }
        }

        match step {
            ControlFlow::Break(outcome) => outcome,
            ControlFlow::Continue(()) => {
                debug!(node_count = nodes.len(), "Full query logging converged");
                ReconcileResult::Continue
            }
        }
    }

    async fn converge_node(&self, node: &Node, desired: bool) -> NodeStep {
        let features = match self.mgmt.feature_set(node).await {
            Ok(features) => features,
            Err(e) => {
                error!(
                    node = %node.name,
                    error = %e,
                    "Failed to verify feature set for full query logging support"
                );
                return requeue();
            }
        };

        if !features.supports(Feature::FullQueryLogging) {
            if desired {
                let err = FqlError::FeatureUnavailable {
                    node: node.name.clone(),
                };
                error!(node = %node.name, error = %err, "Cannot enable full query logging");
                return ControlFlow::Break(ReconcileResult::Error(err));
            }

            // Not requested and not supported; nothing to do this pass.
            debug!(
                node = %node.name,
                "Management API does not support full query logging, nothing to disable"
            );
            return ControlFlow::Break(ReconcileResult::Continue);
        }

        let enabled = match self.mgmt.is_full_query_logging_enabled(node).await {
            Ok(enabled) => enabled,
            Err(e) => {
                error!(
                    node = %node.name,
                    error = %e,
                    "Failed to get full query logging status"
                );
                return requeue();
            }
        };

        debug!(
            node = %node.name,
            is_enabled = enabled,
            should_be_enabled = desired,
            "Full query logging status"
        );

        if enabled == desired {
            return ControlFlow::Continue(());
        }

        info!(
            node = %node.name,
            address = %node.address,
            desired,
            "Setting full query logging"
        );
        if let Err(e) = self.mgmt.set_full_query_logging(node, desired).await {
            warn!(
                node = %node.name,
                address = %node.address,
                error = %e,
                "Failed to set full query logging"
            );
            return requeue();
        }

        ControlFlow::Continue(())
    }
}

fn requeue() -> NodeStep {
    ControlFlow::Break(ReconcileResult::RequeueAfter(SHORT_REQUEUE_DELAY))
}
