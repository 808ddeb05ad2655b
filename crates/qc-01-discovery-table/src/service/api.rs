use std::net::SocketAddr;

use async_trait::async_trait;

use crate::domain::{Node, NodeId, NodeRole, StorageKind, TableResult};
use crate::ports::DiscoveryApi;
use crate::routing::Storage;
use crate::service::Table;

impl Table {
    /// Our own node record.
    pub fn self_node(&self) -> &Node {
        &self.core.self_node
    }

    /// Roles for which this table keeps a routing set.
    pub fn roles(&self) -> Vec<NodeRole> {
        self.core.roles()
    }

    /// Strategy backing `role`'s routing set, if the table keeps one.
    pub fn storage_kind(&self, role: NodeRole) -> Option<StorageKind> {
        self.core.storage(role).map(|s| s.kind())
    }

    /// Number of members in `role`'s routing set (0 if unsupported).
    pub fn len(&self, role: NodeRole) -> usize {
        self.core.storage(role).map_or(0, |s| s.len())
    }

    /// Whether the first refresh has completed.
    pub fn is_initialized(&self) -> bool {
        self.core.is_init_done()
    }

    /// Trigger a refresh of all routing sets and wait for it to finish.
    pub async fn refresh(&self) {
        self.core.refresh().await;
    }
}

/// Bootnodes route lookups but are never handed out as peers, except from
/// the bootnode routing set itself.
fn without_bootnodes(role: NodeRole, nodes: Vec<Node>) -> Vec<Node> {
    if role == NodeRole::Bootnode {
        return nodes;
    }
    nodes
        .into_iter()
        .filter(|n| n.role != NodeRole::Bootnode)
        .collect()
}

#[async_trait]
impl DiscoveryApi for Table {
    async fn resolve(&self, target: NodeId, role: NodeRole) -> Option<Node> {
        let storage = self.core.storage(role)?;

        let key = target.key();
        if let Some(node) = storage.closest(&key, 1).into_entries().into_iter().next() {
            if node.id == target {
                return Some(node);
            }
        }

        storage
            .lookup(&self.core, target, true)
            .await
            .into_iter()
            .find(|n| n.id == target)
    }

    async fn lookup(&self, target: NodeId, role: NodeRole) -> Vec<Node> {
        match self.core.storage(role) {
            Some(storage) => storage.lookup(&self.core, target, true).await,
            None => Vec::new(),
        }
    }

    async fn bond(
        &self,
        pinged: bool,
        id: NodeId,
        addr: SocketAddr,
        tcp_port: u16,
        role: NodeRole,
    ) -> TableResult<Node> {
        self.core.bond(pinged, id, addr, tcp_port, role).await
    }

    fn read_random_nodes(&self, role: NodeRole, count: usize) -> Vec<Node> {
        self.core.storage(role).map_or_else(Vec::new, |s| {
            without_bootnodes(role, s.read_random_nodes(count))
        })
    }

    fn retrieve_nodes(&self, target: NodeId, role: NodeRole, count: usize) -> Vec<Node> {
        self.core.storage(role).map_or_else(Vec::new, |s| {
            without_bootnodes(role, s.closest(&target.key(), count).into_entries())
        })
    }

    fn bucket_entries(&self, role: NodeRole) -> Vec<Vec<Node>> {
        self.core
            .storage(role)
            .map_or_else(Vec::new, |s| s.bucket_entries())
    }

    fn replacements(&self, role: NodeRole) -> Vec<Vec<Node>> {
        self.core
            .storage(role)
            .map_or_else(Vec::new, |s| s.replacements())
    }

    async fn close(&self) {
        Table::close(self).await;
    }
}
