//! # Driving Ports (Inbound API)
//!
//! The API the rest of the node uses to obtain peers to dial.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::domain::{Node, NodeId, NodeRole, TableResult};

/// Primary API for interacting with the discovery table.
///
/// # Error Policy
///
/// Lookups never fail: unreachable peers are absorbed by the failure
/// counter and an unsupported role yields an empty result. Only `bond`
/// reports errors, and only the handshake's own.
///
/// # Example
///
/// ```rust,ignore
/// use qc_01_discovery_table::ports::DiscoveryApi;
///
/// async fn dial_candidates<T: DiscoveryApi>(api: &T, target: NodeId) {
///     let closest = api.lookup(target, NodeRole::Endpoint).await;
///     println!("Found {} peers", closest.len());
/// }
/// ```
#[async_trait]
pub trait DiscoveryApi: Send + Sync {
    /// Find a specific node: locally if its distance key is already known,
    /// otherwise through a lookup. `None` on miss.
    async fn resolve(&self, target: NodeId, role: NodeRole) -> Option<Node>;

    /// Iterative lookup of the nodes of `role` closest to `target`.
    ///
    /// Returns up to bucket-size nodes sorted by ascending distance, never
    /// including bootnodes.
    async fn lookup(&self, target: NodeId, role: NodeRole) -> Vec<Node>;

    /// Ping/pong handshake with a node.
    ///
    /// `pinged` is true when the remote contacted us first.
    async fn bond(
        &self,
        pinged: bool,
        id: NodeId,
        addr: SocketAddr,
        tcp_port: u16,
        role: NodeRole,
    ) -> TableResult<Node>;

    /// Up to `count` random members of `role`'s routing set.
    fn read_random_nodes(&self, role: NodeRole, count: usize) -> Vec<Node>;

    /// The `count` members of `role`'s routing set closest to `target`,
    /// without network traffic.
    fn retrieve_nodes(&self, target: NodeId, role: NodeRole, count: usize) -> Vec<Node>;

    /// Members of `role`'s routing set, one list per bucket.
    fn bucket_entries(&self, role: NodeRole) -> Vec<Vec<Node>>;

    /// Replacement lists of `role`'s routing set, one list per bucket.
    fn replacements(&self, role: NodeRole) -> Vec<Vec<Node>>;

    /// Stop background work and release the transport and node store.
    async fn close(&self);
}
