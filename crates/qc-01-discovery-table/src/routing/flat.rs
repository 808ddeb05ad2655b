//! Flat routing set: a bounded list ordered by recency of validation.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tracing::{debug, trace};

use super::Storage;
use crate::domain::{
    closest_to, LookupMode, Node, NodeId, NodeKey, NodeRole, NodesByDistance, StorageKind,
};
use crate::service::TableCore;

/// Ordered list of nodes, head = most recently validated.
///
/// Revalidation pings the tail: a live tail moves to the head, a dead one
/// is dropped. Inserts are rejected once `max_size` is reached.
pub(crate) struct FlatStorage {
    role: NodeRole,
    self_id: NodeId,
    max_size: usize,
    /// Set for routing sets populated only by broadcast (bootnodes).
    no_discover: bool,
    entries: Mutex<Vec<Node>>,
}

impl FlatStorage {
    pub(crate) fn new(role: NodeRole, self_id: NodeId, max_size: usize, discover: bool) -> Self {
        Self {
            role,
            self_id,
            max_size,
            no_discover: !discover,
            entries: Mutex::new(Vec::with_capacity(max_size)),
        }
    }

    /// Move `id` to the head if still present.
    fn bump(&self, id: &NodeId) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|n| n.id == *id) {
            Some(pos) => {
                let node = entries.remove(pos);
                entries.insert(0, node);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Storage for FlatStorage {
    fn role(&self) -> NodeRole {
        self.role
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Flat
    }

    fn lookup_mode(&self) -> LookupMode {
        LookupMode::SingleRound
    }

    fn add(&self, node: Node) -> bool {
        if node.id == self.self_id {
            return false;
        }

        let mut entries = self.entries.lock();
        if let Some(pos) = entries.iter().position(|n| n.id == node.id) {
            // Keep the residency time of the existing record.
            let existing = entries.remove(pos);
            let mut updated = node;
            updated.added_at = existing.added_at;
            entries.insert(0, updated);
            return true;
        }

        if entries.len() >= self.max_size {
            trace!(role = %self.role, node = %node, "flat routing set full");
            return false;
        }
        entries.insert(0, node);
        true
    }

    fn delete(&self, node: &Node) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| n.id != node.id);
        entries.len() != before
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.entries.lock().iter().any(|n| n.id == *id)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn replacement_len(&self) -> usize {
        0
    }

    fn node_all(&self) -> Vec<Node> {
        self.entries.lock().clone()
    }

    fn closest(&self, target: &NodeKey, count: usize) -> NodesByDistance {
        closest_to(self.entries.lock().iter(), target, count)
    }

    fn stuff(&self, nodes: &[Node]) {
        let mut entries = self.entries.lock();
        for node in nodes {
            if entries.len() >= self.max_size {
                break;
            }
            if node.id == self.self_id || entries.iter().any(|n| n.id == node.id) {
                continue;
            }
            entries.push(node.clone());
        }
    }

    fn read_random_nodes(&self, count: usize) -> Vec<Node> {
        let mut nodes = self.node_all();
        nodes.shuffle(&mut rand::thread_rng());
        nodes.truncate(count);
        nodes
    }

    fn bucket_entries(&self) -> Vec<Vec<Node>> {
        vec![self.node_all()]
    }

    fn replacements(&self) -> Vec<Vec<Node>> {
        vec![Vec::new()]
    }

    async fn do_refresh(&self, core: &Arc<TableCore>) {
        if self.no_discover {
            return;
        }

        let seeds = core.load_seed_nodes(self.role).await;
        self.stuff(&seeds);

        let found = self.lookup(core, core.self_node.id, false).await;
        debug!(role = %self.role, found = found.len(), size = self.len(), "flat refresh done");
    }

    async fn do_revalidate(&self, core: &Arc<TableCore>) {
        let tail = self.entries.lock().last().cloned();
        let Some(last) = tail else {
            return;
        };

        match core.ping(last.id, last.udp_addr()).await {
            Ok(()) => {
                trace!(role = %self.role, node = %last, "revalidated, moving to head");
                self.bump(&last.id);
            }
            Err(e) => {
                debug!(role = %self.role, node = %last, error = %e, "revalidation failed, removing");
                self.delete(&last);
            }
        }
        core.record_occupancy(self);
    }
}
