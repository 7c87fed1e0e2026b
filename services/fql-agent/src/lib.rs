//! fqlsync agent library
//!
//! Keeps full query logging uniformly enabled or disabled across every node
//! of a cluster, as dictated by the cluster's datacenter config document.
//!
//! ## Flow
//!
//! ```text
//! SpecSource ─▶ interpret (feasibility gate) ─▶ FleetConvergence ─▶ ReconcileResult
//!                                                  │
//!                                  NodeEnumerator ─┤
//!                                   ManagementApi ─┘
//! ```
//!
//! ## Modules
//!
//! - `spec`: Cluster spec and schema-validated config document
//! - `interpret`: Desired state derivation and feasibility checks
//! - `nodes`: Cluster membership seam and inventory file enumerator
//! - `mgmt`: Management API seam and HTTP client
//! - `converge`: Per-node convergence sweep
//! - `reconciler`: Pass entry point and driver loop

pub mod config;
pub mod converge;
pub mod error;
pub mod interpret;
pub mod mgmt;
pub mod nodes;
pub mod reconciler;
pub mod spec;

// Re-export commonly used types
pub use converge::{FleetConvergence, FqlReconcileResult};
pub use error::FqlError;
pub use interpret::{interpret, DesiredState};
pub use mgmt::{FeatureSet, ManagementApi, MgmtApiClient};
pub use nodes::{ClusterSelector, Node, NodeEnumerator};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use spec::{ClusterSpec, ServerType, SpecSource};
