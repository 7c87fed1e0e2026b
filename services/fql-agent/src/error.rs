//! Fatal error causes for full query logging reconciliation.
//!
//! Transient failures (node listing, management API calls) have their own
//! error types in `nodes` and `mgmt`; they never reach this enum because
//! convergence maps them to a requeue.

use std::num::ParseIntError;

use thiserror::Error;

use crate::spec::ServerType;

/// Fatal reconciliation errors with standardized reason codes.
#[derive(Debug, Error)]
pub enum FqlError {
    /// The leading segment of the server version is not an integer.
    #[error("invalid server version {version:?}: {source}")]
    InvalidServerVersion {
        version: String,
        #[source]
        source: ParseIntError,
    },

    /// The datacenter config document does not match its schema.
    #[error("invalid datacenter config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// Full query logging was requested on a server that cannot run it.
    #[error(
        "full query logging only supported on OSS Cassandra 4x+ \
         (server_type={server_type}, major_version={major_version})"
    )]
    Unsupported {
        server_type: ServerType,
        major_version: i64,
    },

    /// A node's management API does not advertise full query logging.
    #[error(
        "full query logging should be enabled but node {node} does not \
         advertise support for it via the management API"
    )]
    FeatureUnavailable { node: String },
}

impl FqlError {
    /// Get the standardized reason code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            FqlError::InvalidServerVersion { .. } => "invalid_server_version",
            FqlError::InvalidConfig(_) => "invalid_config",
            FqlError::Unsupported { .. } => "fql_unsupported",
            FqlError::FeatureUnavailable { .. } => "fql_feature_unavailable",
        }
    }

    /// Returns true for errors raised before any node was contacted.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, FqlError::FeatureUnavailable { .. })
    }
}
