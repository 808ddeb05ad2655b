use std::collections::HashMap;

use parking_lot::RwLock;
use rand::seq::SliceRandom;

use crate::domain::{Node, NodeId, NodeRole, StoreError, Timestamp};
use crate::ports::NodeStore;

#[derive(Debug, Default)]
struct NodeRecord {
    node: Option<Node>,
    find_fails: u32,
    last_bond: Option<Timestamp>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<NodeId, NodeRecord>,
    closed: bool,
}

/// In-process node store.
///
/// Keeps node records, failure counters and bond times in memory. Suitable
/// for tests and for nodes that do not need seeds across restarts.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    state: RwLock<StoreState>,
}

impl MemoryNodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (with or without a node).
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    fn write<F>(&self, id: &NodeId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut NodeRecord),
    {
        let mut state = self.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        f(state.records.entry(*id).or_default());
        Ok(())
    }
}

impl NodeStore for MemoryNodeStore {
    fn node(&self, id: &NodeId) -> Option<Node> {
        self.state
            .read()
            .records
            .get(id)
            .and_then(|r| r.node.clone())
    }

    fn update_node(&self, node: &Node) -> Result<(), StoreError> {
        self.write(&node.id, |r| r.node = Some(node.clone()))
    }

    fn delete_node(&self, id: &NodeId) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        state.records.remove(id);
        Ok(())
    }

    fn find_fails(&self, id: &NodeId) -> u32 {
        self.state
            .read()
            .records
            .get(id)
            .map_or(0, |r| r.find_fails)
    }

    fn update_find_fails(&self, id: &NodeId, fails: u32) -> Result<(), StoreError> {
        self.write(id, |r| r.find_fails = fails)
    }

    fn last_bond(&self, id: &NodeId) -> Option<Timestamp> {
        self.state.read().records.get(id).and_then(|r| r.last_bond)
    }

    fn update_last_bond(&self, id: &NodeId, at: Timestamp) -> Result<(), StoreError> {
        self.write(id, |r| r.last_bond = Some(at))
    }

    fn query_seeds(
        &self,
        role: NodeRole,
        count: usize,
        max_age_secs: u64,
        now: Timestamp,
    ) -> Vec<Node> {
        let mut seeds: Vec<Node> = {
            let state = self.state.read();
            state
                .records
                .values()
                .filter(|r| {
                    r.last_bond
                        .is_some_and(|at| now.secs_since(at) <= max_age_secs)
                })
                .filter_map(|r| r.node.clone())
                .filter(|n| n.role == role)
                .collect()
        };
        seeds.shuffle(&mut rand::thread_rng());
        seeds.truncate(count);
        seeds
    }

    fn expire_nodes(&self, now: Timestamp, max_age_secs: u64) -> usize {
        let mut state = self.state.write();
        let before = state.records.len();
        state.records.retain(|_, r| {
            r.last_bond
                .is_some_and(|at| now.secs_since(at) <= max_age_secs)
        });
        before - state.records.len()
    }

    fn close(&self) {
        self.state.write().closed = true;
    }
}
