//! Configuration for the full query logging agent.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use fqlsync_reconcile::{DEFAULT_MAX_RETRIES, DEFAULT_RECONCILE_INTERVAL};

/// Agent configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file holding the cluster spec.
    pub spec_file: PathBuf,

    /// JSON node inventory file.
    pub nodes_file: PathBuf,

    /// Scheme used to reach management APIs (http or https).
    pub mgmt_scheme: String,

    /// Management API port on every node.
    pub mgmt_port: u16,

    /// Timeout for a single management API request.
    pub request_timeout: Duration,

    /// Interval between passes when nothing asked for a requeue.
    pub reconcile_interval: Duration,

    /// Consecutive requeues tolerated before logging at error level.
    pub max_requeues: u32,

    /// Run a single pass and exit.
    pub once: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let spec_file = lookup("FQL_SPEC_FILE")
            .map(PathBuf::from)
            .context("Missing cluster spec. Set FQL_SPEC_FILE.")?;

        let nodes_file = lookup("FQL_NODES_FILE")
            .map(PathBuf::from)
            .context("Missing node inventory. Set FQL_NODES_FILE.")?;

        let mgmt_scheme = lookup("FQL_MGMT_SCHEME").unwrap_or_else(|| "http".to_string());
        if mgmt_scheme != "http" && mgmt_scheme != "https" {
            anyhow::bail!("FQL_MGMT_SCHEME must be http or https, got {mgmt_scheme:?}");
        }

        let mgmt_port: u16 = lookup("FQL_MGMT_PORT")
            .map(|v| v.parse())
            .transpose()
            .context("FQL_MGMT_PORT must be a port number.")?
            .unwrap_or(8080);

        let request_timeout_secs: u64 = lookup("FQL_REQUEST_TIMEOUT_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("FQL_REQUEST_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(30);

        let reconcile_interval = lookup("FQL_RECONCILE_INTERVAL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("FQL_RECONCILE_INTERVAL_SECS must be an integer (seconds).")?
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(DEFAULT_RECONCILE_INTERVAL);

        let max_requeues: u32 = lookup("FQL_MAX_REQUEUES")
            .map(|v| v.parse())
            .transpose()
            .context("FQL_MAX_REQUEUES must be an integer.")?
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let once = lookup("FQL_ONCE")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let log_level = lookup("FQL_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            spec_file,
            nodes_file,
            mgmt_scheme,
            mgmt_port,
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            reconcile_interval,
            max_requeues,
            once,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("FQL_SPEC_FILE", "/etc/fql/cluster.json"),
            ("FQL_NODES_FILE", "/etc/fql/nodes.json"),
        ])
        .unwrap();

        assert_eq!(config.spec_file, PathBuf::from("/etc/fql/cluster.json"));
        assert_eq!(config.mgmt_scheme, "http");
        assert_eq!(config.mgmt_port, 8080);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.reconcile_interval, DEFAULT_RECONCILE_INTERVAL);
        assert_eq!(config.max_requeues, DEFAULT_MAX_RETRIES);
        assert!(!config.once);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FQL_SPEC_FILE", "spec.json"),
            ("FQL_NODES_FILE", "nodes.json"),
            ("FQL_MGMT_SCHEME", "https"),
            ("FQL_MGMT_PORT", "9443"),
            ("FQL_RECONCILE_INTERVAL_SECS", "0"),
            ("FQL_ONCE", "TRUE"),
        ])
        .unwrap();

        assert_eq!(config.mgmt_scheme, "https");
        assert_eq!(config.mgmt_port, 9443);
        assert_eq!(config.reconcile_interval, Duration::from_secs(1));
        assert!(config.once);
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[("FQL_NODES_FILE", "nodes.json")]).unwrap_err();
        assert!(err.to_string().contains("FQL_SPEC_FILE"));

        let err = load(&[
            ("FQL_SPEC_FILE", "spec.json"),
            ("FQL_NODES_FILE", "nodes.json"),
            ("FQL_MGMT_PORT", "70000"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("FQL_MGMT_PORT"));

        let err = load(&[
            ("FQL_SPEC_FILE", "spec.json"),
            ("FQL_NODES_FILE", "nodes.json"),
            ("FQL_MGMT_SCHEME", "ftp"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("FQL_MGMT_SCHEME"));
    }
}
