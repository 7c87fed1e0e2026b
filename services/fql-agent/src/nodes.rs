//! Cluster membership.
//!
//! Node discovery is external to convergence; this module only defines the
//! seam and an inventory-file implementation that is re-read on every call,
//! since membership may change between passes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A cluster member reachable through its management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Stable node name (pod or host name).
    pub name: String,

    /// Host or IP address of the management API.
    pub address: String,
}

impl Node {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Selects the members of one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterSelector {
    pub cluster_name: String,
}

impl ClusterSelector {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }
}

/// Node discovery errors. Always transient from the reconciler's view.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read node inventory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse node inventory {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cluster {0} not found in node inventory")]
    UnknownCluster(String),
}

/// Enumerates the nodes of a cluster.
///
/// Implementations return nodes in a stable order; convergence visits them
/// in exactly that order.
#[async_trait]
pub trait NodeEnumerator: Send + Sync {
    async fn list_nodes(&self, selector: &ClusterSelector) -> Result<Vec<Node>, DiscoveryError>;
}

/// On-disk node inventory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeInventory {
    /// Nodes keyed by cluster name.
    pub clusters: BTreeMap<String, Vec<Node>>,
}

/// Reads a JSON [`NodeInventory`] from disk on every call.
#[derive(Debug, Clone)]
pub struct FileNodeEnumerator {
    path: PathBuf,
}

impl FileNodeEnumerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NodeEnumerator for FileNodeEnumerator {
    async fn list_nodes(&self, selector: &ClusterSelector) -> Result<Vec<Node>, DiscoveryError> {
        let path = self.path.display().to_string();
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DiscoveryError::Io {
                path: path.clone(),
                source,
            })?;

        let mut inventory: NodeInventory = serde_json::from_str(&contents)
            .map_err(|source| DiscoveryError::Parse { path, source })?;

        let nodes = inventory
            .clusters
            .remove(&selector.cluster_name)
            .ok_or_else(|| DiscoveryError::UnknownCluster(selector.cluster_name.clone()))?;

        debug!(
            cluster = %selector.cluster_name,
            node_count = nodes.len(),
            "Listed cluster nodes"
        );

        Ok(nodes)
    }
}
