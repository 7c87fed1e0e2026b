//! In-memory cluster used by the convergence tests.
//!
//! Records every collaborator call so tests can assert which nodes were
//! contacted and in which order.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fqlsync_agent::mgmt::{FeatureSet, ManagementApi, MgmtError};
use fqlsync_agent::nodes::{ClusterSelector, DiscoveryError, Node, NodeEnumerator};
use reqwest::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListNodes(String),
    FeatureSet(String),
    IsEnabled(String),
    SetEnabled(String, bool),
}

#[derive(Debug, Clone)]
struct FakeNode {
    node: Node,
    supports_fql: bool,
    enabled: bool,
}

#[derive(Default)]
struct State {
    nodes: Vec<FakeNode>,
    calls: Vec<Call>,
    fail_listing: bool,
    fail_feature_set: HashSet<String>,
    fail_is_enabled: HashSet<String>,
    fail_set: HashSet<String>,
}

/// A fake cluster implementing both node discovery and the management API.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; names are `node-1`, `node-2`, ... in insertion order.
    pub fn with_node(self, supports_fql: bool, enabled: bool) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let n = state.nodes.len() + 1;
            state.nodes.push(FakeNode {
                node: Node::new(format!("node-{n}"), format!("10.0.0.{n}")),
                supports_fql,
                enabled,
            });
        }
        self
    }

    pub fn fail_listing(self) -> Self {
        self.state.lock().unwrap().fail_listing = true;
        self
    }

    pub fn fail_feature_set(self, node: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_feature_set
            .insert(node.to_string());
        self
    }

    pub fn fail_is_enabled(self, node: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_is_enabled
            .insert(node.to_string());
        self
    }

    pub fn fail_set(self, node: &str) -> Self {
        self.state.lock().unwrap().fail_set.insert(node.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::ListNodes(_)))
            .count()
    }

    pub fn set_calls(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetEnabled(name, enabled) => Some((name, enabled)),
                _ => None,
            })
            .collect()
    }

    /// Names of every node the management API was called for.
    pub fn contacted_nodes(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for call in self.calls() {
            let name = match call {
                Call::ListNodes(_) => continue,
                Call::FeatureSet(name) | Call::IsEnabled(name) | Call::SetEnabled(name, _) => name,
            };
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    /// Current flag value per node.
    pub fn enabled_states(&self) -> BTreeMap<String, bool> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .iter()
            .map(|n| (n.node.name.clone(), n.enabled))
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn injected_failure() -> MgmtError {
        MgmtError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl NodeEnumerator for FakeCluster {
    async fn list_nodes(&self, selector: &ClusterSelector) -> Result<Vec<Node>, DiscoveryError> {
        self.record(Call::ListNodes(selector.cluster_name.clone()));
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(DiscoveryError::UnknownCluster(selector.cluster_name.clone()));
        }
        Ok(state.nodes.iter().map(|n| n.node.clone()).collect())
    }
}

#[async_trait]
impl ManagementApi for FakeCluster {
    async fn feature_set(&self, node: &Node) -> Result<FeatureSet, MgmtError> {
        self.record(Call::FeatureSet(node.name.clone()));
        let state = self.state.lock().unwrap();
        if state.fail_feature_set.contains(&node.name) {
            return Err(Self::injected_failure());
        }

        let fake = state
            .nodes
            .iter()
            .find(|n| n.node.name == node.name)
            .expect("unknown node");
        let mut features = FeatureSet {
            cassandra_version: "4.0.11".to_string(),
            ..FeatureSet::default()
        };
        features.features.insert("async_sstable_tasks".to_string());
        if fake.supports_fql {
            features.features.insert("full_query_logging".to_string());
        }
        Ok(features)
    }

    async fn is_full_query_logging_enabled(&self, node: &Node) -> Result<bool, MgmtError> {
        self.record(Call::IsEnabled(node.name.clone()));
        let state = self.state.lock().unwrap();
        if state.fail_is_enabled.contains(&node.name) {
            return Err(Self::injected_failure());
        }
        Ok(state
            .nodes
            .iter()
            .find(|n| n.node.name == node.name)
            .expect("unknown node")
            .enabled)
    }

    async fn set_full_query_logging(&self, node: &Node, enabled: bool) -> Result<(), MgmtError> {
        self.record(Call::SetEnabled(node.name.clone(), enabled));
        let mut state = self.state.lock().unwrap();
        if state.fail_set.contains(&node.name) {
            return Err(Self::injected_failure());
        }
        let fake = state
            .nodes
            .iter_mut()
            .find(|n| n.node.name == node.name)
            .expect("unknown node");
        fake.enabled = enabled;
        Ok(())
    }
}
