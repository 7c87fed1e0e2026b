//! Management API client.
//!
//! Every node runs a management API sidecar. Convergence needs three of its
//! endpoints:
//! - the feature set advertised by the sidecar
//! - whether full query logging is currently enabled
//! - enabling or disabling full query logging

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::net::IpAddr;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::Config;
use crate::nodes::Node;

const FEATURES_PATH: &str = "/api/v0/metadata/versions/features";
const FULL_QUERY_LOGGING_PATH: &str = "/api/v0/ops/node/fullquerylogging";

/// Management API errors. Always transient from the reconciler's view.
#[derive(Debug, Error)]
pub enum MgmtError {
    #[error("management API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("management API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Optional management API capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Full query logging can be queried and toggled.
    FullQueryLogging,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::FullQueryLogging => "full_query_logging",
        }
    }
}

/// Features advertised by one node's management API.
///
/// Queried fresh on every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeatureSet {
    #[serde(default)]
    pub cassandra_version: String,

    #[serde(default)]
    pub features: BTreeSet<String>,
}

impl FeatureSet {
    pub fn supports(&self, feature: Feature) -> bool {
        self.features.contains(feature.as_str())
    }
}

/// Per-node management operations used by convergence.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Fetch the feature set of a node's management API.
    async fn feature_set(&self, node: &Node) -> Result<FeatureSet, MgmtError>;

    /// Query whether full query logging is enabled on a node.
    async fn is_full_query_logging_enabled(&self, node: &Node) -> Result<bool, MgmtError>;

    /// Enable or disable full query logging on a node.
    async fn set_full_query_logging(&self, node: &Node, enabled: bool) -> Result<(), MgmtError>;
}

/// Host part of a URL; bare IPv6 literals need brackets.
fn url_host(address: &str) -> Cow<'_, str> {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => Cow::Owned(format!("[{ip}]")),
        _ => Cow::Borrowed(address),
    }
}

#[derive(Debug, Deserialize)]
struct EntityResponse<T> {
    entity: T,
}

/// HTTP client for node management APIs.
pub struct MgmtApiClient {
    client: reqwest::Client,
    scheme: String,
    port: u16,
}

impl MgmtApiClient {
    /// Create a new management API client.
    pub fn new(config: &Config) -> Result<Self, MgmtError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            scheme: config.mgmt_scheme.clone(),
            port: config.mgmt_port,
        })
    }

    fn url(&self, node: &Node, path: &str) -> String {
        format!("{}://{}:{}{}", self.scheme, url_host(&node.address), self.port, path)
    }

    async fn check(response: reqwest::Response, node: &Node) -> Result<reqwest::Response, MgmtError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(node = %node.name, status = %status, body = %body, "Management API request failed");
        Err(MgmtError::Status { status, body })
    }
}

#[async_trait]
impl ManagementApi for MgmtApiClient {
    async fn feature_set(&self, node: &Node) -> Result<FeatureSet, MgmtError> {
        let url = self.url(node, FEATURES_PATH);
        debug!(node = %node.name, url = %url, "Fetching management API features");

        let response = self.client.get(&url).send().await?;

        // Older management APIs predate the features endpoint.
        if response.status() == StatusCode::NOT_FOUND {
            debug!(node = %node.name, "Features endpoint not found, assuming no optional features");
            return Ok(FeatureSet::default());
        }

        let features: FeatureSet = Self::check(response, node).await?.json().await?;
        debug!(
            node = %node.name,
            cassandra_version = %features.cassandra_version,
            feature_count = features.features.len(),
            "Fetched management API features"
        );

        Ok(features)
    }

    async fn is_full_query_logging_enabled(&self, node: &Node) -> Result<bool, MgmtError> {
        let url = self.url(node, FULL_QUERY_LOGGING_PATH);
        debug!(node = %node.name, url = %url, "Fetching full query logging status");

        let response = self.client.get(&url).send().await?;
        let body: EntityResponse<bool> = Self::check(response, node).await?.json().await?;

        Ok(body.entity)
    }

    async fn set_full_query_logging(&self, node: &Node, enabled: bool) -> Result<(), MgmtError> {
        let url = self.url(node, FULL_QUERY_LOGGING_PATH);
        debug!(node = %node.name, url = %url, enabled, "Setting full query logging");

        let response = self
            .client
            .post(&url)
            .query(&[("enabled", enabled)])
            .send()
            .await?;
        Self::check(response, node).await?;

        Ok(())
    }
}
