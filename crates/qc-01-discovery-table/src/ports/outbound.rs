//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces this subsystem **requires** the host application
//! to implement: the UDP discovery transport, the durable node store, a
//! clock and a configuration source.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::domain::{Node, NodeId, NodeRole, StoreError, TableConfig, Timestamp, TransportError};

/// Discovery wire protocol (ping/pong/findnode).
///
/// The core treats any error as "peer unreachable" and folds it into the
/// failure counter; it never inspects the variant.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: bonding, lookups and revalidation
/// call into the transport from many tasks at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a ping and wait for the matching pong.
    ///
    /// The transport owns the reply deadline.
    async fn ping(&self, id: NodeId, addr: SocketAddr) -> Result<(), TransportError>;

    /// Wait until `id` pings us, or until the transport's deadline passes.
    async fn wait_ping(&self, id: NodeId) -> Result<(), TransportError>;

    /// Ask `id` for the nodes of `role` closest to `target`.
    async fn find_node(
        &self,
        id: NodeId,
        addr: SocketAddr,
        target: NodeId,
        role: NodeRole,
    ) -> Result<Vec<Node>, TransportError>;

    /// Release sockets. Called once, after all table work has drained.
    fn close(&self);
}

/// Durable cache of previously seen nodes.
///
/// Reads return defaults for unknown nodes. Writes may fail; the table logs
/// and absorbs those failures.
pub trait NodeStore: Send + Sync {
    /// Fetch a node record.
    fn node(&self, id: &NodeId) -> Option<Node>;

    /// Insert or replace a node record.
    fn update_node(&self, node: &Node) -> Result<(), StoreError>;

    /// Remove a node record and everything attached to it.
    fn delete_node(&self, id: &NodeId) -> Result<(), StoreError>;

    /// Consecutive findnode failures (0 if unknown).
    fn find_fails(&self, id: &NodeId) -> u32;

    fn update_find_fails(&self, id: &NodeId, fails: u32) -> Result<(), StoreError>;

    /// Time of the last successful bond, if any.
    fn last_bond(&self, id: &NodeId) -> Option<Timestamp>;

    fn update_last_bond(&self, id: &NodeId, at: Timestamp) -> Result<(), StoreError>;

    /// Up to `count` nodes of `role` bonded within `max_age_secs` of `now`.
    fn query_seeds(
        &self,
        role: NodeRole,
        count: usize,
        max_age_secs: u64,
        now: Timestamp,
    ) -> Vec<Node>;

    /// Drop nodes whose last bond is older than `max_age_secs`.
    ///
    /// Returns the number of removed records.
    fn expire_nodes(&self, now: Timestamp, max_age_secs: u64) -> usize;

    /// Flush and release the store. Later writes fail with `StoreError::Closed`.
    fn close(&self);
}

/// Abstract interface for time-related operations.
///
/// Enables deterministic testing by injecting controllable time sources.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Abstract interface for configuration loading.
pub trait ConfigProvider: Send + Sync {
    /// Fallback seed nodes used when the table is empty.
    fn get_bootstrap_nodes(&self) -> Vec<Node>;

    /// Table tuning parameters.
    fn get_table_config(&self) -> TableConfig;
}
