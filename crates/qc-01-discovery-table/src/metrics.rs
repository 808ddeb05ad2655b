//! # Discovery Table Metrics
//!
//! Prometheus metrics for routing-set occupancy.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-01-discovery-table = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `discovery_table_nodes` - Gauge of routing-set members (by role)
//! - `discovery_table_replacements` - Gauge of replacement-list entries (by role)
//! - `discovery_findnode_evictions_total` - Counter of failure-driven evictions (by role)

use crate::domain::NodeRole;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter_vec, register_int_gauge_vec, IntCounterVec, IntGaugeVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Routing-set members, labeled by role
    pub static ref TABLE_NODES: IntGaugeVec = register_int_gauge_vec!(
        "discovery_table_nodes",
        "Number of nodes in the routing set",
        &["role"]
    )
    .expect("Failed to create TABLE_NODES metric");

    /// Replacement-list entries, labeled by role
    pub static ref TABLE_REPLACEMENTS: IntGaugeVec = register_int_gauge_vec!(
        "discovery_table_replacements",
        "Number of nodes waiting in replacement lists",
        &["role"]
    )
    .expect("Failed to create TABLE_REPLACEMENTS metric");

    /// Nodes evicted after too many findnode failures, labeled by role
    pub static ref FINDNODE_EVICTIONS: IntCounterVec = register_int_counter_vec!(
        "discovery_findnode_evictions_total",
        "Total number of nodes evicted after repeated findnode failures",
        &["role"]
    )
    .expect("Failed to create FINDNODE_EVICTIONS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record routing-set occupancy for a role
#[cfg(feature = "metrics")]
pub fn set_occupancy(role: NodeRole, nodes: usize, replacements: usize) {
    TABLE_NODES
        .with_label_values(&[role.as_str()])
        .set(nodes as i64);
    TABLE_REPLACEMENTS
        .with_label_values(&[role.as_str()])
        .set(replacements as i64);
}

/// Record a failure-driven eviction
#[cfg(feature = "metrics")]
pub fn record_findnode_eviction(role: NodeRole) {
    FINDNODE_EVICTIONS.with_label_values(&[role.as_str()]).inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn set_occupancy(_role: NodeRole, _nodes: usize, _replacements: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_findnode_eviction(_role: NodeRole) {}
