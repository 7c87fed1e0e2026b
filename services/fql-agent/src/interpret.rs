//! Derives the desired full query logging state from the cluster spec.
//!
//! The feasibility gate lives here too: asking for full query logging on a
//! server that cannot run it is a hard error, never a silent downgrade.

use tracing::{error, info};

use crate::error::FqlError;
use crate::spec::{ClusterSpec, ConfigDocument};

/// Lowest server major version with full query logging.
pub const MIN_FQL_MAJOR_VERSION: i64 = 4;

/// Desired state for one reconciliation pass.
///
/// Derived once per pass and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesiredState {
    /// Whether full query logging should be enabled on every node.
    pub enabled: bool,

    /// Server major version used for convergence decisions.
    pub major_version: i64,
}

impl DesiredState {
    /// Returns true if the deployment can run full query logging at all.
    pub fn fql_capable_version(&self) -> bool {
        self.major_version >= MIN_FQL_MAJOR_VERSION
    }
}

/// Parse the leading dot-delimited segment of a server version.
///
/// The segment must fit in a signed 8-bit integer.
pub fn parse_major_version(server_version: &str) -> Result<i64, FqlError> {
    let leading = server_version.split('.').next().unwrap_or_default();
    leading
        .parse::<i8>()
        .map(i64::from)
        .map_err(|source| FqlError::InvalidServerVersion {
            version: server_version.to_string(),
            source,
        })
}

/// Interpret the cluster spec into the desired state for this pass.
pub fn interpret(spec: &ClusterSpec) -> Result<DesiredState, FqlError> {
    let major_version = parse_major_version(&spec.server_version).inspect_err(|e| {
        error!(
            error = %e,
            "Can't reconcile full query logging without knowing the server major version"
        );
    })?;

    let mut enabled = false;
    if let Some(raw) = spec.config.as_deref() {
        let document = ConfigDocument::parse(raw).map_err(|e| {
            error!(error = %e, "Failed to decode datacenter config");
            FqlError::InvalidConfig(e)
        })?;

        if document.full_query_logging_requested() {
            if major_version < MIN_FQL_MAJOR_VERSION
                || !spec.server_type.supports_full_query_logging()
            {
                let err = FqlError::Unsupported {
                    server_type: spec.server_type.clone(),
                    major_version,
                };
                error!(
                    error = %err,
                    server_type = %spec.server_type,
                    major_version,
                    "full_query_logging_options is set but not supported by this server"
                );
                return Err(err);
            }

            info!(
                major_version,
                "full_query_logging_options is set, full query logging will be enabled via the management API"
            );
            enabled = true;
        }
    }

    // Other variants never converge: disabled, and a major version that
    // skips node contact entirely. Applies even without a cassandra-yaml
    // section, unlike the older early return that kept the real version.
    if !spec.server_type.supports_full_query_logging() {
        return Ok(DesiredState {
            enabled: false,
            major_version: 0,
        });
    }

    Ok(DesiredState {
        enabled,
        major_version,
    })
}
