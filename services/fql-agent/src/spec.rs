//! Cluster specification and its datacenter config document.
//!
//! The config document is an arbitrary JSON object owned by the operator of
//! the cluster. Only the `cassandra-yaml` section is interpreted here, and it
//! is validated against a schema when decoded: a section of the wrong shape
//! is a decode error rather than a failed cast at lookup time.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

/// Key of the config section mirroring `cassandra.yaml`.
pub const CASSANDRA_YAML_SECTION: &str = "cassandra-yaml";

/// Key whose presence inside `cassandra-yaml` requests full query logging.
pub const FQL_OPTIONS_KEY: &str = "full_query_logging_options";

/// Server variant running on the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ServerType {
    /// Open source Apache Cassandra.
    Cassandra,
    /// DataStax Enterprise.
    Dse,
    /// Any other variant tag.
    Other(String),
}

impl ServerType {
    /// Returns true for the only variant that supports full query logging.
    pub fn supports_full_query_logging(&self) -> bool {
        matches!(self, ServerType::Cassandra)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ServerType::Cassandra => "cassandra",
            ServerType::Dse => "dse",
            ServerType::Other(tag) => tag,
        }
    }
}

impl From<String> for ServerType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "cassandra" => ServerType::Cassandra,
            "dse" => ServerType::Dse,
            _ => ServerType::Other(tag),
        }
    }
}

impl From<&str> for ServerType {
    fn from(tag: &str) -> Self {
        ServerType::from(tag.to_string())
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster-wide specification, as written by the cluster's operator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Name of the cluster; selects which nodes are converged.
    pub cluster_name: String,

    /// Server variant.
    pub server_type: ServerType,

    /// Dotted server version, e.g. `4.1.0`.
    pub server_version: String,

    /// Raw datacenter config document. Decoded lazily so that a malformed
    /// document is reported by the pass that needs it.
    #[serde(default)]
    pub config: Option<Box<RawValue>>,
}

impl ClusterSpec {
    /// Create a spec without a config document.
    pub fn new(
        cluster_name: impl Into<String>,
        server_type: impl Into<ServerType>,
        server_version: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            server_type: server_type.into(),
            server_version: server_version.into(),
            config: None,
        }
    }

    /// Attach a raw JSON config document.
    pub fn with_config(mut self, json: &str) -> Result<Self, serde_json::Error> {
        self.config = Some(RawValue::from_string(json.to_string())?);
        Ok(self)
    }
}

/// Schema-validated view of the datacenter config document.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(
        rename = "cassandra-yaml",
        default,
        deserialize_with = "present_section"
    )]
    cassandra_yaml: Option<ConfigSection>,
}

/// A nested config section (always a JSON object).
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
struct ConfigSection(Map<String, Value>);

// A section that is present must be an object; `null` is rejected too.
fn present_section<'de, D>(deserializer: D) -> Result<Option<ConfigSection>, D::Error>
where
    D: Deserializer<'de>,
{
    ConfigSection::deserialize(deserializer).map(Some)
}

impl ConfigDocument {
    /// Decode a raw config document.
    ///
    /// The top level must be a JSON object; other sections are ignored.
    pub fn parse(raw: &RawValue) -> Result<Self, serde_json::Error> {
        let top: Map<String, Value> = serde_json::from_str(raw.get())?;
        serde_json::from_value(Value::Object(top))
    }

    /// Returns true if the document has a `cassandra-yaml` section.
    pub fn has_cassandra_yaml(&self) -> bool {
        self.cassandra_yaml.is_some()
    }

    /// Returns true if `cassandra-yaml` declares full query logging options.
    ///
    /// Only the presence of the key matters, not its value.
    pub fn full_query_logging_requested(&self) -> bool {
        self.cassandra_yaml
            .as_ref()
            .is_some_and(|section| section.0.contains_key(FQL_OPTIONS_KEY))
    }
}

/// Source of the cluster specification, consulted once per pass.
#[async_trait]
pub trait SpecSource: Send + Sync {
    async fn load(&self) -> Result<ClusterSpec>;
}

/// Reads the cluster specification from a JSON file on every pass.
#[derive(Debug, Clone)]
pub struct FileSpecSource {
    path: PathBuf,
}

impl FileSpecSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SpecSource for FileSpecSource {
    async fn load(&self) -> Result<ClusterSpec> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read cluster spec {}", self.path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cluster spec {}", self.path.display()))
    }
}
