//! Which routing sets a node keeps, depending on its own role.
//!
//! | local role | consensus | proxy | endpoint | bootnode |
//! |------------|-----------|-------|----------|----------|
//! | consensus  | flat      | flat  | -        | flat*    |
//! | proxy      | flat      | flat  | bucketed | flat*    |
//! | endpoint   | -         | flat  | bucketed | flat*    |
//! | bootnode   | flat      | flat  | bucketed | flat*    |
//!
//! `*` populated only by broadcast, never refreshed by discovery.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Node, NodeRole, StorageKind, TableConfig};
use crate::routing::{BucketedStorage, FlatStorage, Storage};

/// One routing set of the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RoutingSet {
    pub(crate) role: NodeRole,
    pub(crate) kind: StorageKind,
    /// Whether refresh runs discovery for this set.
    pub(crate) discover: bool,
}

const fn flat(role: NodeRole) -> RoutingSet {
    RoutingSet {
        role,
        kind: StorageKind::Flat,
        discover: true,
    }
}

const fn bucketed(role: NodeRole) -> RoutingSet {
    RoutingSet {
        role,
        kind: StorageKind::Bucketed,
        discover: true,
    }
}

const BOOTNODES: RoutingSet = RoutingSet {
    role: NodeRole::Bootnode,
    kind: StorageKind::Flat,
    discover: false,
};

const CONSENSUS: &[RoutingSet] = &[
    flat(NodeRole::Consensus),
    flat(NodeRole::Proxy),
    BOOTNODES,
];

const FULL: &[RoutingSet] = &[
    flat(NodeRole::Consensus),
    flat(NodeRole::Proxy),
    bucketed(NodeRole::Endpoint),
    BOOTNODES,
];

const ENDPOINT: &[RoutingSet] = &[
    flat(NodeRole::Proxy),
    bucketed(NodeRole::Endpoint),
    BOOTNODES,
];

/// Routing sets kept by a node of role `local`.
pub(crate) fn routing_sets(local: NodeRole) -> &'static [RoutingSet] {
    match local {
        NodeRole::Consensus => CONSENSUS,
        NodeRole::Proxy | NodeRole::Bootnode => FULL,
        NodeRole::Endpoint => ENDPOINT,
    }
}

/// Instantiate the routing sets for `self_node`'s role.
pub(crate) fn build_storages(
    self_node: &Node,
    config: &TableConfig,
) -> HashMap<NodeRole, Arc<dyn Storage>> {
    routing_sets(self_node.role)
        .iter()
        .map(|set| {
            let storage: Arc<dyn Storage> = match set.kind {
                StorageKind::Flat => Arc::new(FlatStorage::new(
                    set.role,
                    self_node.id,
                    config.flat_max_size,
                    set.discover,
                )),
                StorageKind::Bucketed => {
                    Arc::new(BucketedStorage::new(set.role, self_node.id, config))
                }
            };
            (set.role, storage)
        })
        .collect()
}
